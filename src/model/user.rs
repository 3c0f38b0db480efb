use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub password: String,
}

#[derive(Debug, FromRow)]
pub struct RefreshTokenRecord {
    pub id: u64,
    pub user_id: u64,
    pub revoked: bool,
}
