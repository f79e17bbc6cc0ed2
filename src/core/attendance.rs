//! Attendance tokens - Signed QR codes that mark a member present at a meal.
//!
//! A token value has the form `nonce.member_id.purpose.issued_at` (unix seconds). The
//! HMAC-SHA256 of `member_id|purpose|issued_at` under the mess secret is stored with
//! the token row and checked in constant time on every scan.
//!
//! Consumption is a single conditional `UPDATE` on `usage_count < max_usage`, so two
//! scanners racing on the same single-use code cannot both succeed.

use crate::{
    config::{secrets::SecretProvider, settings::TokenSettings},
    core::{
        auth::{self, Action, ActorContext},
        clock::{Clock, local_date},
        member::get_member,
        tenant::get_active_tenant,
    },
    entities::{
        ApprovalStatus, AttendanceToken, MealAttendance, MealType, TokenPurpose, attendance_token,
        meal_attendance, member,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use sha2::Sha256;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Decoded form of a token value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    /// Random part that makes each token value unique
    pub nonce: String,
    /// Member the token was issued to
    pub member_id: i64,
    /// What the token grants
    pub purpose: TokenPurpose,
    /// Issue instant, unix seconds
    pub issued_at: i64,
}

impl TokenPayload {
    /// The value printed into the QR code.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.nonce,
            self.member_id,
            self.purpose.as_str(),
            self.issued_at
        )
    }

    /// Splits a scanned value back into its parts. Anything malformed is reported as
    /// [`Error::InvalidSignature`], the same as a forged code.
    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = value.split('.');
        let (Some(nonce), Some(member_id), Some(purpose), Some(issued_at), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(Error::InvalidSignature);
        };
        if nonce.is_empty() {
            return Err(Error::InvalidSignature);
        }
        Ok(Self {
            nonce: nonce.to_string(),
            member_id: member_id.parse().map_err(|_| Error::InvalidSignature)?,
            purpose: TokenPurpose::parse(purpose).ok_or(Error::InvalidSignature)?,
            issued_at: issued_at.parse().map_err(|_| Error::InvalidSignature)?,
        })
    }

    fn signing_message(&self) -> String {
        format!("{}|{}|{}", self.member_id, self.purpose.as_str(), self.issued_at)
    }
}

fn mac_for(secret: &[u8], payload: &TokenPayload) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| Error::Config {
        message: format!("unusable token secret: {e}"),
    })?;
    mac.update(payload.signing_message().as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA256 of the payload's signing message.
pub fn sign(secret: &[u8], payload: &TokenPayload) -> Result<String> {
    Ok(hex::encode(mac_for(secret, payload)?.finalize().into_bytes()))
}

/// Constant-time check of a hex signature against the payload.
pub fn verify(secret: &[u8], payload: &TokenPayload, signature: &str) -> Result<()> {
    let expected = hex::decode(signature).map_err(|_| Error::InvalidSignature)?;
    mac_for(secret, payload)?
        .verify_slice(&expected)
        .map_err(|_| Error::InvalidSignature)
}

/// Parameters of a token to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRequest {
    /// Member the token is for
    pub member_id: i64,
    /// What it grants
    pub purpose: TokenPurpose,
    /// Lifetime
    pub ttl: Duration,
    /// Allowed scans
    pub max_usage: i32,
}

impl TokenRequest {
    /// A request using the configured lifetime and usage cap.
    #[must_use]
    pub fn with_defaults(member_id: i64, purpose: TokenPurpose, settings: &TokenSettings) -> Self {
        Self {
            member_id,
            purpose,
            ttl: settings.ttl(),
            max_usage: settings.max_usage,
        }
    }
}

/// A token that passed validation, with its owner.
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    /// Stored token row
    pub token: attendance_token::Model,
    /// Owner of the token
    pub member: member::Model,
    /// What it grants
    pub purpose: TokenPurpose,
    /// Decoded value
    pub payload: TokenPayload,
}

/// Issues a new token for an approved member.
#[instrument(skip(db, clock, secrets, actor))]
pub async fn issue(
    db: &DatabaseConnection,
    clock: &impl Clock,
    secrets: &impl SecretProvider,
    actor: &ActorContext,
    tenant_id: i64,
    request: TokenRequest,
) -> Result<attendance_token::Model> {
    if request.ttl <= Duration::zero() {
        return Err(Error::invalid("token lifetime must be positive"));
    }
    if request.max_usage < 1 {
        return Err(Error::invalid("token must allow at least one use"));
    }
    let secret = secrets.token_secret()?;

    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    let member = get_member(&txn, tenant_id, request.member_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::IssueToken, &tenant, member.id)?;
    if !member.is_active() {
        return Err(Error::unauthorized(format!(
            "member {} is not an approved member",
            member.id
        )));
    }

    let now = clock.now();
    let payload = TokenPayload {
        nonce: Uuid::new_v4().simple().to_string(),
        member_id: member.id,
        purpose: request.purpose,
        issued_at: now.timestamp(),
    };
    let signature = sign(&secret, &payload)?;

    let token = attendance_token::ActiveModel {
        token: Set(payload.encode()),
        tenant_id: Set(tenant_id),
        member_id: Set(member.id),
        purpose: Set(request.purpose),
        issued_at: Set(now),
        expires_at: Set(now + request.ttl),
        usage_count: Set(0),
        max_usage: Set(request.max_usage),
        signature: Set(signature),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    debug!(token_id = token.id, "Attendance token issued");
    Ok(token)
}

/// Checks a scanned value without consuming it.
///
/// Fails with [`Error::InvalidSignature`] for malformed or forged values,
/// [`Error::Expired`] past `expires_at`, [`Error::Exhausted`] once every use is spent.
pub async fn validate<C>(
    db: &C,
    clock: &impl Clock,
    secrets: &impl SecretProvider,
    token_value: &str,
) -> Result<ValidatedToken>
where
    C: ConnectionTrait,
{
    let payload = TokenPayload::parse(token_value)?;
    let token = AttendanceToken::find()
        .filter(attendance_token::Column::Token.eq(token_value))
        .one(db)
        .await?
        .ok_or(Error::RecordNotFound {
            kind: "attendance token",
            id: payload.member_id,
        })?;

    if token.member_id != payload.member_id
        || token.purpose != payload.purpose
        || token.issued_at.timestamp() != payload.issued_at
    {
        return Err(Error::InvalidSignature);
    }
    verify(&secrets.token_secret()?, &payload, &token.signature)?;

    if clock.now() > token.expires_at {
        return Err(Error::Expired);
    }
    if token.usage_count >= token.max_usage {
        return Err(Error::Exhausted);
    }
    if !token.is_active {
        return Err(Error::Expired);
    }

    let member = get_member(db, token.tenant_id, token.member_id).await?;
    if !member.is_active() {
        return Err(Error::unauthorized(format!(
            "token owner {} is not an approved member",
            member.id
        )));
    }

    Ok(ValidatedToken {
        purpose: token.purpose,
        token,
        member,
        payload,
    })
}

/// Uses up one scan of the token inside the caller's transaction. Returns false when
/// the token is inactive, expired or already spent.
pub async fn consume_in<C>(db: &C, token_id: i64, now: DateTime<Utc>) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = AttendanceToken::update_many()
        .col_expr(
            attendance_token::Column::UsageCount,
            Expr::col(attendance_token::Column::UsageCount).add(1),
        )
        .filter(attendance_token::Column::Id.eq(token_id))
        .filter(attendance_token::Column::IsActive.eq(true))
        .filter(attendance_token::Column::ExpiresAt.gte(now))
        .filter(
            Expr::col(attendance_token::Column::UsageCount)
                .lt(Expr::col(attendance_token::Column::MaxUsage)),
        )
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Ok(false);
    }

    AttendanceToken::update_many()
        .col_expr(attendance_token::Column::IsActive, Expr::value(false))
        .filter(attendance_token::Column::Id.eq(token_id))
        .filter(
            Expr::col(attendance_token::Column::UsageCount)
                .gte(Expr::col(attendance_token::Column::MaxUsage)),
        )
        .exec(db)
        .await?;
    Ok(true)
}

/// Uses up one scan of the token in its own transaction.
#[instrument(skip(db, clock))]
pub async fn consume(db: &DatabaseConnection, clock: &impl Clock, token_id: i64) -> Result<bool> {
    let txn = db.begin().await?;
    let consumed = consume_in(&txn, token_id, clock.now()).await?;
    txn.commit().await?;
    if !consumed {
        debug!(token_id, "Token not consumable");
    }
    Ok(consumed)
}

/// Scans a meal-attendance code: validates it, refuses a second attendance for the
/// same meal, consumes the token and records the attendance, all in one transaction.
#[instrument(skip(db, clock, secrets, actor, token_value))]
pub async fn record_meal_attendance(
    db: &DatabaseConnection,
    clock: &impl Clock,
    secrets: &impl SecretProvider,
    actor: &ActorContext,
    tenant_id: i64,
    token_value: &str,
    meal_type: MealType,
) -> Result<meal_attendance::Model> {
    let now = clock.now();
    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::ScanToken, &tenant)?;

    let validated = validate(&txn, clock, secrets, token_value).await?;
    if validated.token.tenant_id != tenant_id {
        warn!(tenant_id, token_id = validated.token.id, "Token from another mess scanned");
        return Err(Error::unauthorized("token belongs to another mess"));
    }
    if validated.purpose != TokenPurpose::MealAttendance {
        return Err(Error::invalid(format!(
            "token is for {}, not meal attendance",
            validated.purpose.as_str()
        )));
    }

    let date = local_date(now, tenant.utc_offset_minutes);
    let existing = MealAttendance::find()
        .filter(meal_attendance::Column::MemberId.eq(validated.member.id))
        .filter(meal_attendance::Column::Date.eq(date))
        .filter(meal_attendance::Column::MealType.eq(meal_type))
        .filter(meal_attendance::Column::Status.ne(ApprovalStatus::Rejected))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::DuplicateEntry {
            kind: "meal attendance",
            detail: format!(
                "member {} already attended {meal_type:?} on {date}",
                validated.member.id
            ),
        });
    }

    if !consume_in(&txn, validated.token.id, now).await? {
        return Err(Error::Exhausted);
    }

    let attendance = meal_attendance::ActiveModel {
        tenant_id: Set(tenant_id),
        member_id: Set(validated.member.id),
        date: Set(date),
        meal_type: Set(meal_type),
        status: Set(ApprovalStatus::Pending),
        token_id: Set(Some(validated.token.id)),
        scanned_by: Set(actor.person_id()),
        scanned_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(
        attendance_id = attendance.id,
        member_id = attendance.member_id,
        "Meal attendance recorded"
    );
    Ok(attendance)
}

async fn review_attendance(
    db: &DatabaseConnection,
    actor: &ActorContext,
    attendance_id: i64,
    approve: bool,
) -> Result<meal_attendance::Model> {
    let txn = db.begin().await?;
    let attendance = MealAttendance::find_by_id(attendance_id)
        .one(&txn)
        .await?
        .ok_or(Error::RecordNotFound {
            kind: "meal attendance",
            id: attendance_id,
        })?;
    let tenant = get_active_tenant(&txn, attendance.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::Approve, &tenant)?;

    let status = if approve {
        attendance.status.approve("meal attendance", attendance_id)?
    } else {
        attendance.status.reject("meal attendance", attendance_id)?
    };
    let mut active: meal_attendance::ActiveModel = attendance.into();
    active.status = Set(status);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Confirms a scanned attendance.
#[instrument(skip(db, actor))]
pub async fn approve_attendance(
    db: &DatabaseConnection,
    actor: &ActorContext,
    attendance_id: i64,
) -> Result<meal_attendance::Model> {
    review_attendance(db, actor, attendance_id, true).await
}

/// Discards a scanned attendance; the member may be scanned again for that meal.
#[instrument(skip(db, actor))]
pub async fn reject_attendance(
    db: &DatabaseConnection,
    actor: &ActorContext,
    attendance_id: i64,
) -> Result<meal_attendance::Model> {
    review_attendance(db, actor, attendance_id, false).await
}

/// Deactivates every token past its expiry and returns how many were switched off.
#[instrument(skip(db, clock))]
pub async fn deactivate_expired_tokens(db: &DatabaseConnection, clock: &impl Clock) -> Result<u64> {
    let txn = db.begin().await?;
    let result = AttendanceToken::update_many()
        .col_expr(attendance_token::Column::IsActive, Expr::value(false))
        .filter(attendance_token::Column::IsActive.eq(true))
        .filter(attendance_token::Column::ExpiresAt.lt(clock.now()))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    if result.rows_affected > 0 {
        info!(count = result.rows_affected, "Expired attendance tokens deactivated");
    }
    Ok(result.rows_affected)
}
