//! Authentication and student records service

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::{AuthConfig, SeedConfig},
    error::{AppError, AppResult},
    models::user::{LoginUser, NewUser, RegisterUser, Role, User, UserClaims},
    repository::UsersStore,
};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersStore>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersStore>, config: AuthConfig) -> Self {
        Self { users, config }
    }

    /// Register a student account and return a session token
    pub async fn register(&self, request: RegisterUser) -> AppResult<(String, User)> {
        request.validate()?;

        if request.role == Role::Librarian {
            return Err(AppError::Validation(
                "Librarian accounts cannot be self-registered".to_string(),
            ));
        }

        let student_id = request
            .student_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Validation("Student ID is required for students".to_string()))?
            .to_string();

        let email = request.email.trim().to_string();
        if self.users.email_exists(&email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        if self.users.student_id_exists(&student_id).await? {
            return Err(AppError::Conflict("Student ID already registered".to_string()));
        }

        let user = self
            .users
            .create(&NewUser {
                name: request.name.trim().to_string(),
                email,
                password_hash: self.hash_password(&request.password)?,
                role: Role::Student,
                student_id: Some(student_id),
            })
            .await?;

        tracing::info!(user_id = user.id, "Student registered");

        let token = self.create_token_for_user(&user)?;
        Ok((token, user))
    }

    /// Authenticate by email and password; students also present their student ID
    pub async fn login(&self, request: LoginUser) -> AppResult<(String, User)> {
        let user = self
            .users
            .get_by_email(request.email.trim())
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !self.verify_password(&user, &request.password)? {
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        if user.role == Role::Student {
            let presented = request
                .student_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AppError::Validation("Student ID is required".to_string()))?;

            if user.student_id.as_deref() != Some(presented) {
                return Err(AppError::Authentication("Student ID does not match".to_string()));
            }
        }

        let token = self.create_token_for_user(&user)?;
        Ok((token, user))
    }

    /// Create JWT token for a user
    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = i64::try_from(self.config.jwt_expiration_hours)
            .ok()
            .and_then(|hours| hours.checked_mul(3600))
            .and_then(|seconds| now.checked_add(seconds))
            .ok_or_else(|| AppError::Internal("Token lifetime out of range".to_string()))?;

        let claims = UserClaims {
            sub: user.id.to_string(),
            user_id: user.id,
            role: user.role,
            email: user.email.clone(),
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Verify user password
    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.users.get_by_id(id).await
    }

    pub async fn list_students(&self) -> AppResult<Vec<User>> {
        self.users.list_students().await
    }

    /// Get a student record; librarians are not reported as students
    pub async fn get_student(&self, id: i32) -> AppResult<User> {
        let user = self.users.get_by_id(id).await?;
        if user.role != Role::Student {
            return Err(AppError::NotFound(format!("Student with id {} not found", id)));
        }
        Ok(user)
    }

    /// Create the configured librarian account if it does not exist yet
    pub async fn seed_librarian(&self, seed: &SeedConfig) -> AppResult<Option<User>> {
        let (Some(email), Some(password)) = (&seed.librarian_email, &seed.librarian_password) else {
            return Ok(None);
        };

        if self.users.email_exists(email).await? {
            tracing::debug!("Librarian {} already present", email);
            return Ok(None);
        }

        let user = self
            .users
            .create(&NewUser {
                name: seed.librarian_name.clone(),
                email: email.clone(),
                password_hash: self.hash_password(password)?,
                role: Role::Librarian,
                student_id: None,
            })
            .await?;

        tracing::info!(user_id = user.id, "Seeded librarian account {}", email);
        Ok(Some(user))
    }
}
