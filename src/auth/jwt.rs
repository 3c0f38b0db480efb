use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

fn now() -> usize {
    chrono::Utc::now().timestamp().max(0) as usize
}

fn issue(
    user_id: u64,
    email: &str,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id,
        sub: email.to_string(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(
    user_id: u64,
    email: &str,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    issue(user_id, email, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

pub fn generate_refresh_token(
    user_id: u64,
    email: &str,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    issue(user_id, email, TokenType::Refresh, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn access_tokens_verify_with_the_same_secret() {
        let token = generate_access_token(7, "jane@company.com", SECRET, 900).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "jane@company.com");
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let token = generate_access_token(7, "jane@company.com", SECRET, 900).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn refresh_tokens_carry_unique_ids() {
        let (_, a) = generate_refresh_token(1, "a@b.c", SECRET, 60).unwrap();
        let (_, b) = generate_refresh_token(1, "a@b.c", SECRET, 60).unwrap();
        assert_eq!(a.token_type, TokenType::Refresh);
        assert_ne!(a.jti, b.jti);
    }
}
