use crate::models::{ChirpRecord, Document, RevokedTokenRecord, UserRecord};
use crate::{Datastore, Result, StoreError};
use tracing::debug;

impl Datastore {
    // -- Users --

    /// Insert a new user. Emails are unique, compared after trimming and
    /// case-folding; the trimmed form is what gets stored.
    pub fn create_user(&self, email: &str, hashed_password: &str) -> Result<UserRecord> {
        let email = email.trim();
        self.with_document_mut(|doc| {
            if find_user_by_email(doc, email).is_some() {
                return Err(StoreError::AlreadyExists("user"));
            }

            let id = doc.users.last_key_value().map_or(1, |(id, _)| id + 1);
            let user = UserRecord {
                id,
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
                is_upgraded: false,
            };
            doc.users.insert(id, user.clone());

            debug!("Created user {}", id);
            Ok(user)
        })
    }

    pub fn get_user(&self, id: u64) -> Result<UserRecord> {
        self.with_document(|doc| {
            doc.users
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound("user"))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<UserRecord> {
        self.with_document(|doc| {
            find_user_by_email(doc, email)
                .cloned()
                .ok_or(StoreError::NotFound("user"))
        })
    }

    /// Replace a user's email and password hash. Fails with `AlreadyExists`
    /// if a different user already holds the new email.
    pub fn update_user(
        &self,
        id: u64,
        email: &str,
        hashed_password: &str,
    ) -> Result<UserRecord> {
        let email = email.trim();
        self.with_document_mut(|doc| {
            if !doc.users.contains_key(&id) {
                return Err(StoreError::NotFound("user"));
            }
            if find_user_by_email(doc, email).is_some_and(|other| other.id != id) {
                return Err(StoreError::AlreadyExists("user"));
            }

            let user = doc
                .users
                .get_mut(&id)
                .ok_or(StoreError::NotFound("user"))?;
            user.email = email.to_string();
            user.hashed_password = hashed_password.to_string();

            debug!("Updated user {}", id);
            Ok(user.clone())
        })
    }

    /// Mark a user as upgraded. Upgrading an already upgraded user succeeds.
    pub fn upgrade_user(&self, id: u64) -> Result<()> {
        self.with_document_mut(|doc| {
            let user = doc
                .users
                .get_mut(&id)
                .ok_or(StoreError::NotFound("user"))?;
            user.is_upgraded = true;

            debug!("Upgraded user {}", id);
            Ok(())
        })
    }

    // -- Chirps --

    /// Assign the next id and insert in the same persist, so the counter and
    /// the collection can never disagree.
    pub fn create_chirp(&self, author_id: u64, body: &str) -> Result<ChirpRecord> {
        self.with_document_mut(|doc| {
            let highest = doc.chirps.last_key_value().map_or(0, |(id, _)| *id);
            let id = doc.chirp_last_id.max(highest) + 1;
            doc.chirp_last_id = id;

            let chirp = ChirpRecord {
                id,
                author_id,
                body: body.to_string(),
            };
            doc.chirps.insert(id, chirp.clone());

            debug!("Created chirp {} by user {}", id, author_id);
            Ok(chirp)
        })
    }

    pub fn get_chirp(&self, id: u64) -> Result<ChirpRecord> {
        self.with_document(|doc| {
            doc.chirps
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound("chirp"))
        })
    }

    /// All chirps, ordered by ascending id.
    pub fn list_chirps(&self) -> Result<Vec<ChirpRecord>> {
        self.with_document(|doc| Ok(doc.chirps.values().cloned().collect()))
    }

    /// Remove a chirp. The id counter is left alone so ids are never reused.
    pub fn delete_chirp(&self, id: u64) -> Result<()> {
        self.with_document_mut(|doc| {
            doc.chirps
                .remove(&id)
                .ok_or(StoreError::NotFound("chirp"))?;

            debug!("Deleted chirp {}", id);
            Ok(())
        })
    }

    // -- Revoked tokens --

    /// Record a token as revoked. Revoking twice keeps the first timestamp.
    pub fn revoke_token(&self, token: &str) -> Result<()> {
        self.with_document_mut(|doc| {
            doc.revoked_tokens
                .entry(token.to_string())
                .or_insert_with(|| RevokedTokenRecord {
                    token: token.to_string(),
                    revoked_at: chrono::Utc::now(),
                });
            Ok(())
        })
    }

    pub fn is_token_revoked(&self, token: &str) -> Result<bool> {
        self.with_document(|doc| Ok(doc.revoked_tokens.contains_key(token)))
    }
}

fn find_user_by_email<'a>(doc: &'a Document, email: &str) -> Option<&'a UserRecord> {
    let wanted = email_key(email);
    doc.users.values().find(|u| email_key(&u.email) == wanted)
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}
