use std::sync::{Arc, LazyLock};

use thiserror::Error;
use tracing::info;

use chirpy_db::{ChirpRecord, Datastore, StoreError, UserRecord};
use chirpy_types::api::SortOrder;
use chirpy_types::models::{Chirp, User};

use crate::password::{self, CredentialError};
use crate::tokens::{self, TokenError, TokenKind};

pub const MAX_CHIRP_LENGTH: usize = 140;

const BANNED_WORDS: &[&str] = &["kerfuffle", "sharbert", "fornax"];
const CENSORED: &str = "****";

/// Hash checked against when the email is unknown, so both failure paths
/// pay for one Argon2 verification.
static UNKNOWN_USER_HASH: LazyLock<String> = LazyLock::new(|| {
    password::hash_password("chirpy-unknown-user").unwrap_or_default()
});

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("{0}")]
    Invalid(&'static str),

    #[error("not allowed")]
    Unauthorized,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("chirp is too long")]
    TooLong,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => LedgerError::NotFound(what),
            StoreError::AlreadyExists(what) => LedgerError::AlreadyExists(what),
            other => LedgerError::Storage(other),
        }
    }
}

/// The one ownership rule: only the owner may mutate a resource.
pub fn authorize_mutation(identity: u64, owner: u64) -> Result<(), LedgerError> {
    if identity == owner {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized)
    }
}

/// Replace banned words (space separated, any case) with asterisks.
pub fn filter_profanity(body: &str) -> String {
    body.split(' ')
        .map(|word| {
            if BANNED_WORDS.contains(&word.to_lowercase().as_str()) {
                CENSORED
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A freshly logged-in user and their token pair.
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

// -- Accounts --

#[derive(Clone)]
pub struct AccountDirectory {
    db: Arc<Datastore>,
    jwt_secret: Arc<str>,
}

impl AccountDirectory {
    pub fn new(db: Arc<Datastore>, jwt_secret: &str) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
        }
    }

    pub fn register(&self, email: &str, password: &str) -> Result<User, LedgerError> {
        let email = validate_credentials(email, password)?;
        let hash = password::hash_password(password)?;
        let user = self.db.create_user(email, &hash)?;

        info!("Registered user {}", user.id);
        Ok(user_from_record(user))
    }

    /// Unknown email and wrong password are reported identically.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User, LedgerError> {
        let user = match self.db.get_user_by_email(email) {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                let _ = password::verify_password(password, &UNKNOWN_USER_HASH);
                return Err(LedgerError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !password::verify_password(password, &user.hashed_password) {
            return Err(LedgerError::InvalidCredentials);
        }
        Ok(user_from_record(user))
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Session, LedgerError> {
        let user = self.authenticate(email, password)?;
        let access_token = tokens::issue_token(TokenKind::Access, &self.jwt_secret, user.id)?;
        let refresh_token = tokens::issue_token(TokenKind::Refresh, &self.jwt_secret, user.id)?;

        Ok(Session {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Resolve an access token to the user id it was issued for.
    pub fn identify(&self, access_token: &str) -> Result<u64, LedgerError> {
        Ok(tokens::extract_user_id(
            TokenKind::Access,
            &self.jwt_secret,
            access_token,
        )?)
    }

    /// Exchange a refresh token for a new access token. The refresh token
    /// must verify and must not have been revoked.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, LedgerError> {
        let user_id =
            tokens::extract_user_id(TokenKind::Refresh, &self.jwt_secret, refresh_token)?;

        if self.db.is_token_revoked(refresh_token)? {
            return Err(TokenError::Invalid.into());
        }

        Ok(tokens::issue_token(TokenKind::Access, &self.jwt_secret, user_id)?)
    }

    /// Revoke a refresh token. Revoking an already revoked token succeeds.
    pub fn revoke(&self, refresh_token: &str) -> Result<(), LedgerError> {
        let user_id =
            tokens::extract_user_id(TokenKind::Refresh, &self.jwt_secret, refresh_token)?;
        self.db.revoke_token(refresh_token)?;

        info!("Revoked a refresh token for user {}", user_id);
        Ok(())
    }

    pub fn update_profile(
        &self,
        id: u64,
        email: &str,
        password: &str,
    ) -> Result<User, LedgerError> {
        let email = validate_credentials(email, password)?;
        let hash = password::hash_password(password)?;
        let user = self.db.update_user(id, email, &hash)?;
        Ok(user_from_record(user))
    }

    pub fn upgrade(&self, id: u64) -> Result<(), LedgerError> {
        self.db.upgrade_user(id)?;
        info!("User {} upgraded to Chirpy Red", id);
        Ok(())
    }
}

// -- Chirps --

#[derive(Clone)]
pub struct ChirpLedger {
    db: Arc<Datastore>,
}

impl ChirpLedger {
    pub fn new(db: Arc<Datastore>) -> Self {
        Self { db }
    }

    /// Filter and store a chirp. The author must be an existing user and the
    /// filtered body must fit in [`MAX_CHIRP_LENGTH`] characters.
    pub fn post(&self, author_id: u64, body: &str) -> Result<Chirp, LedgerError> {
        match self.db.get_user(author_id) {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => return Err(LedgerError::Unauthorized),
            Err(e) => return Err(e.into()),
        }

        let body = filter_profanity(body);
        if body.chars().count() > MAX_CHIRP_LENGTH {
            return Err(LedgerError::TooLong);
        }

        let chirp = self.db.create_chirp(author_id, &body)?;
        Ok(chirp_from_record(chirp))
    }

    pub fn get(&self, id: u64) -> Result<Chirp, LedgerError> {
        Ok(chirp_from_record(self.db.get_chirp(id)?))
    }

    /// List chirps sorted by id, optionally only those by one author.
    pub fn list(&self, author_id: Option<u64>, sort: SortOrder) -> Result<Vec<Chirp>, LedgerError> {
        let mut chirps: Vec<Chirp> = self
            .db
            .list_chirps()?
            .into_iter()
            .filter(|c| author_id.is_none_or(|id| c.author_id == id))
            .map(chirp_from_record)
            .collect();

        match sort {
            SortOrder::Asc => chirps.sort_by_key(|c| c.id),
            SortOrder::Desc => chirps.sort_by_key(|c| std::cmp::Reverse(c.id)),
        }
        Ok(chirps)
    }

    pub fn delete(&self, requester: u64, id: u64) -> Result<(), LedgerError> {
        let chirp = self.db.get_chirp(id)?;
        authorize_mutation(requester, chirp.author_id)?;
        self.db.delete_chirp(id)?;

        info!("User {} deleted chirp {}", requester, id);
        Ok(())
    }
}

fn validate_credentials<'a>(email: &'a str, password: &str) -> Result<&'a str, LedgerError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(LedgerError::Invalid("email and password are required"));
    }
    Ok(email)
}

fn user_from_record(row: UserRecord) -> User {
    User {
        id: row.id,
        email: row.email,
        is_chirpy_red: row.is_upgraded,
    }
}

fn chirp_from_record(row: ChirpRecord) -> Chirp {
    Chirp {
        id: row.id,
        author_id: row.author_id,
        body: row.body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SECRET: &str = "ledger-secret";

    fn setup() -> (TempDir, Arc<Datastore>, AccountDirectory, ChirpLedger) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Datastore::open(&dir.path().join("database.json")).unwrap());
        let accounts = AccountDirectory::new(db.clone(), SECRET);
        let chirps = ChirpLedger::new(db.clone());
        (dir, db, accounts, chirps)
    }

    #[test]
    fn filter_replaces_banned_words_any_case() {
        assert_eq!(
            filter_profanity("This is a Kerfuffle opinion I need to share with the world"),
            "This is a **** opinion I need to share with the world"
        );
        assert_eq!(filter_profanity("SHARBERT and fornax"), "**** and ****");
    }

    #[test]
    fn filter_leaves_punctuated_words() {
        assert_eq!(filter_profanity("Sharbert! kerfuffle."), "Sharbert! kerfuffle.");
        assert_eq!(filter_profanity("hello world"), "hello world");
    }

    #[test]
    fn authorize_mutation_requires_owner() {
        assert!(authorize_mutation(3, 3).is_ok());
        assert!(matches!(authorize_mutation(3, 4), Err(LedgerError::Unauthorized)));
    }

    #[test]
    fn register_stores_hash_not_plaintext() {
        let (_dir, db, accounts, _chirps) = setup();

        let user = accounts.register("walt@breakingbad.com", "04234").unwrap();
        let stored = db.get_user_by_email("walt@breakingbad.com").unwrap();

        assert_eq!(stored.id, user.id);
        assert_ne!(stored.hashed_password, "04234");
        assert!(password::verify_password("04234", &stored.hashed_password));
    }

    #[test]
    fn register_rejects_duplicates_and_blanks() {
        let (_dir, _db, accounts, _chirps) = setup();

        accounts.register("a@example.com", "pw").unwrap();
        assert!(matches!(
            accounts.register("a@example.com", "pw2"),
            Err(LedgerError::AlreadyExists(_))
        ));
        assert!(matches!(
            accounts.register("   ", "pw"),
            Err(LedgerError::Invalid(_))
        ));
        assert!(matches!(
            accounts.register("b@example.com", ""),
            Err(LedgerError::Invalid(_))
        ));
    }

    #[test]
    fn authenticate_hides_which_check_failed() {
        let (_dir, _db, accounts, _chirps) = setup();
        accounts.register("a@example.com", "right").unwrap();

        assert!(matches!(
            accounts.authenticate("a@example.com", "wrong"),
            Err(LedgerError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.authenticate("nobody@example.com", "right"),
            Err(LedgerError::InvalidCredentials)
        ));
        assert!(accounts.authenticate("a@example.com", "right").is_ok());
    }

    #[test]
    fn unknown_user_hash_is_a_real_argon2_hash() {
        assert!(argon2::PasswordHash::new(&UNKNOWN_USER_HASH).is_ok());
        assert!(password::verify_password("chirpy-unknown-user", &UNKNOWN_USER_HASH));
    }

    #[test]
    fn unknown_email_costs_as_much_as_wrong_password() {
        let (_dir, _db, accounts, _chirps) = setup();
        accounts.register("a@example.com", "right").unwrap();
        // Warm the lazily built hash so it is not counted below
        let _ = accounts.authenticate("nobody@example.com", "x");

        let timed = |email: &str| {
            let start = std::time::Instant::now();
            for _ in 0..3 {
                let _ = accounts.authenticate(email, "wrong");
            }
            start.elapsed()
        };
        let known = timed("a@example.com");
        let unknown = timed("nobody@example.com");

        assert!(
            unknown * 4 >= known,
            "unknown email took {:?}, known email took {:?}",
            unknown,
            known
        );
    }

    #[test]
    fn login_tokens_identify_user() {
        let (_dir, _db, accounts, _chirps) = setup();
        let user = accounts.register("a@example.com", "pw").unwrap();

        let session = accounts.login("a@example.com", "pw").unwrap();
        assert_eq!(accounts.identify(&session.access_token).unwrap(), user.id);
        assert!(accounts.identify(&session.refresh_token).is_err());
    }

    #[test]
    fn revoked_refresh_token_still_verifies_but_is_refused() {
        let (_dir, db, accounts, _chirps) = setup();
        let user = accounts.register("a@example.com", "pw").unwrap();
        let session = accounts.login("a@example.com", "pw").unwrap();

        let access = accounts.refresh(&session.refresh_token).unwrap();
        assert_eq!(accounts.identify(&access).unwrap(), user.id);

        accounts.revoke(&session.refresh_token).unwrap();
        accounts.revoke(&session.refresh_token).unwrap();

        assert!(db.is_token_revoked(&session.refresh_token).unwrap());
        assert_eq!(
            tokens::extract_user_id(TokenKind::Refresh, SECRET, &session.refresh_token),
            Ok(user.id)
        );
        assert!(matches!(
            accounts.refresh(&session.refresh_token),
            Err(LedgerError::Token(TokenError::Invalid))
        ));
    }

    #[test]
    fn access_token_cannot_refresh_or_be_revoked() {
        let (_dir, _db, accounts, _chirps) = setup();
        accounts.register("a@example.com", "pw").unwrap();
        let session = accounts.login("a@example.com", "pw").unwrap();

        assert!(matches!(
            accounts.refresh(&session.access_token),
            Err(LedgerError::Token(TokenError::Invalid))
        ));
        assert!(matches!(
            accounts.revoke(&session.access_token),
            Err(LedgerError::Token(TokenError::Invalid))
        ));
    }

    #[test]
    fn update_profile_changes_login() {
        let (_dir, _db, accounts, _chirps) = setup();
        let user = accounts.register("old@example.com", "old").unwrap();

        let updated = accounts.update_profile(user.id, "new@example.com", "new").unwrap();
        assert_eq!(updated.email, "new@example.com");
        assert!(accounts.authenticate("new@example.com", "new").is_ok());
        assert!(accounts.authenticate("old@example.com", "old").is_err());
    }

    #[test]
    fn upgrade_shows_on_user() {
        let (_dir, _db, accounts, _chirps) = setup();
        let user = accounts.register("a@example.com", "pw").unwrap();
        assert!(!user.is_chirpy_red);

        accounts.upgrade(user.id).unwrap();
        accounts.upgrade(user.id).unwrap();
        assert!(accounts.authenticate("a@example.com", "pw").unwrap().is_chirpy_red);
        assert!(matches!(accounts.upgrade(99), Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn post_requires_existing_author() {
        let (_dir, _db, _accounts, chirps) = setup();

        assert!(matches!(chirps.post(7, "hello world"), Err(LedgerError::Unauthorized)));
        assert!(chirps.list(None, SortOrder::Asc).unwrap().is_empty());
    }

    #[test]
    fn post_then_get_returns_body_unchanged() {
        let (_dir, _db, accounts, chirps) = setup();
        let author = accounts.register("a@example.com", "pw").unwrap();

        let chirp = chirps.post(author.id, "hello world").unwrap();
        let fetched = chirps.get(chirp.id).unwrap();
        assert_eq!(
            fetched,
            Chirp {
                id: chirp.id,
                author_id: author.id,
                body: "hello world".into()
            }
        );
    }

    #[test]
    fn post_enforces_length_after_filtering() {
        let (_dir, _db, accounts, chirps) = setup();
        let author = accounts.register("a@example.com", "pw").unwrap();

        assert!(chirps.post(author.id, &"a".repeat(MAX_CHIRP_LENGTH)).is_ok());
        assert!(matches!(
            chirps.post(author.id, &"a".repeat(MAX_CHIRP_LENGTH + 1)),
            Err(LedgerError::TooLong)
        ));

        // 145 characters before filtering, 140 after.
        let padded = format!("{} kerfuffle", "a".repeat(135));
        let chirp = chirps.post(author.id, &padded).unwrap();
        assert!(chirp.body.ends_with(" ****"));

        // Multi-byte characters count once each.
        assert!(chirps.post(author.id, &"é".repeat(MAX_CHIRP_LENGTH)).is_ok());
    }

    #[test]
    fn list_sorts_and_filters() {
        let (_dir, _db, accounts, chirps) = setup();
        let a = accounts.register("a@example.com", "pw").unwrap();
        let b = accounts.register("b@example.com", "pw").unwrap();

        for i in 0..3 {
            chirps.post(a.id, &format!("a{}", i)).unwrap();
            chirps.post(b.id, &format!("b{}", i)).unwrap();
        }
        chirps.delete(a.id, 3).unwrap();

        let asc: Vec<u64> = chirps.list(None, SortOrder::Asc).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(asc, vec![1, 2, 4, 5, 6]);

        let desc: Vec<u64> = chirps.list(None, SortOrder::Desc).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(desc, vec![6, 5, 4, 2, 1]);

        let by_b: Vec<u64> = chirps.list(Some(b.id), SortOrder::Asc).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(by_b, vec![2, 4, 6]);
    }

    #[test]
    fn delete_by_other_user_is_refused() {
        let (_dir, _db, accounts, chirps) = setup();
        let author = accounts.register("a@example.com", "pw").unwrap();
        let other = accounts.register("b@example.com", "pw").unwrap();
        let chirp = chirps.post(author.id, "mine").unwrap();

        assert!(matches!(chirps.delete(other.id, chirp.id), Err(LedgerError::Unauthorized)));
        assert!(chirps.get(chirp.id).is_ok());

        chirps.delete(author.id, chirp.id).unwrap();
        assert!(matches!(chirps.get(chirp.id), Err(LedgerError::NotFound(_))));
        assert!(matches!(chirps.delete(author.id, chirp.id), Err(LedgerError::NotFound(_))));
    }
}
