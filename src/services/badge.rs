//! Visitor badge numbers and their QR payloads.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::db::models::Visitor;
use crate::db::visitor_repository::VisitorRepository;
use crate::error::AppError;

pub const BADGE_PREFIX: &str = "AG-";
/// No `0/O` or `1/I` so badges can be read aloud.
pub const BADGE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const BADGE_LENGTH: usize = 6;
pub const MAX_BADGE_ATTEMPTS: usize = 8;

pub fn generate_badge_number<R: Rng>(rng: &mut R) -> String {
    let suffix: String = (0..BADGE_LENGTH)
        .map(|_| BADGE_ALPHABET[rng.random_range(0..BADGE_ALPHABET.len())] as char)
        .collect();
    format!("{BADGE_PREFIX}{suffix}")
}

/// Give `visitor` a badge number no checked-in visitor of the tenant holds,
/// and insert it.
///
/// The unique index on active badges is the final arbiter: when a concurrent
/// check-in wins the same number between the lookup and the insert, a new
/// number is drawn from the same attempt budget.
pub async fn insert_with_free_badge(
    visitors: &dyn VisitorRepository,
    visitor: &mut Visitor,
) -> Result<(), AppError> {
    for _ in 0..MAX_BADGE_ATTEMPTS {
        let candidate = generate_badge_number(&mut rand::rng());
        if visitors.badge_in_use(&visitor.tenant_id, &candidate).await? {
            tracing::debug!("Badge {candidate} already in use, retrying");
            continue;
        }

        visitor.badge_number = candidate;
        match visitors.insert(visitor).await {
            Ok(()) => return Ok(()),
            Err(AppError::Conflict(_)) => {
                tracing::debug!("Badge {} taken concurrently, retrying", visitor.badge_number);
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::Internal(format!(
        "Could not allocate a free badge number after {MAX_BADGE_ATTEMPTS} attempts"
    )))
}

/// What the printed QR code carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgePayload {
    pub badge: String,
    pub visitor_id: String,
    pub site_id: String,
    /// Check-in time, Unix milliseconds.
    pub issued_at: i64,
}

impl From<&Visitor> for BadgePayload {
    fn from(visitor: &Visitor) -> Self {
        Self {
            badge: visitor.badge_number.clone(),
            visitor_id: visitor.id.clone(),
            site_id: visitor.site_id.clone(),
            issued_at: visitor.check_in_at.timestamp_millis(),
        }
    }
}

pub fn encode_qr_payload(payload: &BadgePayload) -> Result<String, AppError> {
    let json = serde_json::to_vec(payload)
        .map_err(|e| AppError::Internal(format!("Failed to encode badge payload: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub fn decode_qr_payload(encoded: &str) -> Result<BadgePayload, AppError> {
    let invalid = || AppError::BadRequest("Invalid badge QR payload".into());

    let bytes = URL_SAFE_NO_PAD.decode(encoded.trim()).map_err(|_| invalid())?;
    let payload: BadgePayload = serde_json::from_slice(&bytes).map_err(|_| invalid())?;

    if !payload.badge.starts_with(BADGE_PREFIX) {
        return Err(invalid());
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::{sample_visitor, MemoryStore};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_badge_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let badge = generate_badge_number(&mut rng);
            assert_eq!(badge.len(), BADGE_PREFIX.len() + BADGE_LENGTH);
            assert!(badge.starts_with(BADGE_PREFIX));
            assert!(badge[BADGE_PREFIX.len()..]
                .bytes()
                .all(|b| BADGE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_qr_payload_is_url_safe() {
        let payload = BadgePayload {
            badge: "AG-ABC234".to_string(),
            visitor_id: "5f0c?>>".to_string(),
            site_id: "s-1".to_string(),
            issued_at: 1_700_000_000_000,
        };
        let encoded = encode_qr_payload(&payload).unwrap();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(decode_qr_payload(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_qr_payload("%%%"), Err(AppError::BadRequest(_))));

        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(decode_qr_payload(&not_json).is_err());

        let wrong_prefix = URL_SAFE_NO_PAD.encode(
            br#"{"badge":"XX-1","visitor_id":"v","site_id":"s","issued_at":0}"#,
        );
        assert!(decode_qr_payload(&wrong_prefix).is_err());
    }

    fn unbadged_visitor() -> Visitor {
        let mut visitor = sample_visitor("v-1", "t-1", "s-1");
        visitor.badge_number = String::new();
        visitor
    }

    #[tokio::test]
    async fn test_gives_up_when_everything_is_taken() {
        let store = MemoryStore::default();
        store.set_all_badges_taken(true);
        let mut visitor = unbadged_visitor();
        assert!(matches!(
            insert_with_free_badge(&store, &mut visitor).await,
            Err(AppError::Internal(_))
        ));
        assert_eq!(store.visitor_count(), 0);
    }

    #[tokio::test]
    async fn test_inserts_with_free_badge() {
        let store = MemoryStore::default();
        let mut visitor = unbadged_visitor();
        insert_with_free_badge(&store, &mut visitor).await.unwrap();
        assert!(visitor.badge_number.starts_with(BADGE_PREFIX));
        assert_eq!(store.visitor_count(), 1);
    }

    #[tokio::test]
    async fn test_redraws_after_losing_a_badge_race() {
        let store = MemoryStore::default();
        store.lose_badge_races(2);
        let mut visitor = unbadged_visitor();
        insert_with_free_badge(&store, &mut visitor).await.unwrap();
        assert_eq!(store.visitor_count(), 1);
    }

    #[tokio::test]
    async fn test_race_losses_share_the_attempt_budget() {
        let store = MemoryStore::default();
        store.lose_badge_races(MAX_BADGE_ATTEMPTS);
        let mut visitor = unbadged_visitor();
        assert!(matches!(
            insert_with_free_badge(&store, &mut visitor).await,
            Err(AppError::Internal(_))
        ));
    }
}
