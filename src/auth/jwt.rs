use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::config::{JwtConfig, TokenConfig};
use crate::state::AppState;

/// Signing and verification keys for one token kind.
#[derive(Clone)]
pub struct KeyPair {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl From<&TokenConfig> for KeyPair {
    fn from(cfg: &TokenConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
        }
    }
}

/// Access and refresh keys are independent: a token signed for one kind
/// never verifies as the other.
#[derive(Clone)]
pub struct JwtKeys {
    pub access: KeyPair,
    pub refresh: KeyPair,
    pub issuer: String,
    pub audience: String,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            access: KeyPair::from(&cfg.access),
            refresh: KeyPair::from(&cfg.refresh),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

/// Identity fields copied into access tokens.
pub struct Subject<'a> {
    pub id: Uuid,
    pub username: &'a str,
    pub email: &'a str,
}

impl JwtKeys {
    fn pair(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn sign_with_kind(&self, subject: &Subject<'_>, kind: TokenKind) -> anyhow::Result<String> {
        let keys = self.pair(kind);
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(keys.ttl.as_secs() as i64);
        let (username, email) = match kind {
            TokenKind::Access => (
                Some(subject.username.to_string()),
                Some(subject.email.to_string()),
            ),
            TokenKind::Refresh => (None, None),
        };
        let claims = Claims {
            sub: subject.id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            jti: Uuid::new_v4(),
            username,
            email,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding)?;
        debug!(user_id = %subject.id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, subject: &Subject<'_>) -> anyhow::Result<String> {
        self.sign_with_kind(subject, TokenKind::Access)
    }

    pub fn sign_refresh(&self, subject: &Subject<'_>) -> anyhow::Result<String> {
        self.sign_with_kind(subject, TokenKind::Refresh)
    }

    fn verify_kind(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.pair(kind).decoding, &validation)?;
        if data.claims.kind != kind {
            anyhow::bail!("expected {} token", kind_name(kind));
        }
        debug!(user_id = %data.claims.sub, kind = ?kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_kind(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_kind(token, TokenKind::Refresh)
    }
}

fn kind_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => "access",
        TokenKind::Refresh => "refresh",
    }
}

#[cfg(test)]
mod jwt_tests {
    use super::*;
    use crate::state::fake;

    fn make_keys() -> JwtKeys {
        JwtKeys::from(&fake::config().jwt)
    }

    fn subject(id: Uuid) -> Subject<'static> {
        Subject {
            id,
            username: "alice",
            email: "a@x.com",
        }
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(&subject(user_id)).expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.username.as_deref(), Some("alice"));
    }

    #[test]
    fn sign_and_verify_refresh_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_refresh(&subject(user_id)).expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Refresh);
        assert!(claims.email.is_none());
    }

    #[test]
    fn kinds_do_not_cross_verify() {
        let keys = make_keys();
        let access = keys.sign_access(&subject(Uuid::new_v4())).unwrap();
        let refresh = keys.sign_refresh(&subject(Uuid::new_v4())).unwrap();
        assert!(keys.verify_refresh(&access).is_err());
        assert!(keys.verify_access(&refresh).is_err());
    }

    #[test]
    fn same_second_tokens_differ() {
        let keys = make_keys();
        let s = subject(Uuid::new_v4());
        assert_ne!(keys.sign_refresh(&s).unwrap(), keys.sign_refresh(&s).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let good = make_keys();
        let mut cfg = fake::config().jwt;
        cfg.access.secret = "someone-elses-secret".into();
        let forged = JwtKeys::from(&cfg)
            .sign_access(&subject(Uuid::new_v4()))
            .unwrap();
        assert!(good.verify_access(&forged).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = make_keys();
        let mut cfg = fake::config().jwt;
        cfg.issuer = "bad-iss".into();
        cfg.audience = "bad-aud".into();
        let token = JwtKeys::from(&cfg)
            .sign_access(&subject(Uuid::new_v4()))
            .unwrap();
        let err = good.verify_access(&token).unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    fn expired(kind: TokenKind) -> Claims {
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        Claims {
            sub: Uuid::new_v4(),
            iat: now - 600,
            // past the default 60 s leeway
            exp: now - 120,
            iss: "test-issuer".into(),
            aud: "test-aud".into(),
            kind,
            jti: Uuid::new_v4(),
            username: None,
            email: None,
        }
    }

    #[test]
    fn expired_tokens_are_rejected() {
        use jsonwebtoken::errors::{Error as JwtError, ErrorKind};

        let keys = make_keys();
        let access = encode(&Header::default(), &expired(TokenKind::Access), &keys.access.encoding)
            .unwrap();
        let refresh = encode(
            &Header::default(),
            &expired(TokenKind::Refresh),
            &keys.refresh.encoding,
        )
        .unwrap();

        for err in [
            keys.verify_access(&access).unwrap_err(),
            keys.verify_refresh(&refresh).unwrap_err(),
        ] {
            let is_expired = err
                .downcast_ref::<JwtError>()
                .is_some_and(|e| matches!(e.kind(), ErrorKind::ExpiredSignature));
            assert!(is_expired, "{err}");
        }
    }
}
