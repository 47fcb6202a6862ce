use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::SessionKeys,
    },
    constants::PASSWORD_MIN_LENGTH,
    error::{Error, FieldErrors},
    form::{check_text, required, CredentialsPayload, ProfilePayload, RegisterPayload},
    schema::{NewUser, User, UserChanges},
    store::Store,
};

/// Lowercases the domain part of an email, leaving the local part as typed.
pub fn normalize_email(email: &str) -> String {
    match email.trim().rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_owned(),
    }
}

fn check_email(email: &str, errors: &mut FieldErrors) {
    match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => errors.add("email", "Enter a valid email address."),
    }
}

fn check_password(password: &str, errors: &mut FieldErrors) {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.add(
            "password",
            &format!("Ensure this field has at least {PASSWORD_MIN_LENGTH} characters."),
        );
    }
}

async fn insert_user(
    store: &dyn Store,
    email: &str,
    password: &str,
    name: &str,
    elevated: bool,
) -> Result<User, Error> {
    if email.trim().is_empty() {
        return Err(Error::invalid("email", "Email cannot be empty."));
    }

    let user = NewUser {
        email: normalize_email(email),
        name: name.to_owned(),
        password: hash_password(password)?,
        is_staff: elevated,
        is_superuser: elevated,
    };
    let user = store.insert_user(user).await?;
    log::info!("Created user {} (id {})", user.email, user.id);

    Ok(user)
}

pub async fn create_user(
    store: &dyn Store,
    email: &str,
    password: &str,
    name: &str,
) -> Result<User, Error> {
    insert_user(store, email, password, name, false).await
}

pub async fn create_superuser(
    store: &dyn Store,
    email: &str,
    password: &str,
    name: &str,
) -> Result<User, Error> {
    insert_user(store, email, password, name, true).await
}

/// Validates a sign-up request before creating the account.
pub async fn register_user(store: &dyn Store, payload: RegisterPayload) -> Result<User, Error> {
    let mut errors = FieldErrors::default();

    let email = required("email", payload.email, &mut errors);
    let email = check_text("email", email, false, &mut errors);
    if !email.is_empty() {
        check_email(&email, &mut errors);
    }

    let password = required("password", payload.password, &mut errors);
    check_password(&password, &mut errors);

    let name = check_text("name", payload.name.unwrap_or_default(), true, &mut errors);
    errors.into_result(())?;

    create_user(store, &email, &password, &name).await
}

/// Exchanges credentials for a session token.
pub async fn login_user(
    store: &dyn Store,
    keys: &SessionKeys,
    payload: CredentialsPayload,
) -> Result<String, Error> {
    let mut errors = FieldErrors::default();
    let email = required("email", payload.email, &mut errors);
    let password = required("password", payload.password, &mut errors);
    errors.into_result(())?;

    let user = store.get_user_by_email(&normalize_email(&email)).await?;
    let Some(user) = user else {
        return Err(Error::InvalidCredentials);
    };
    if !user.is_active || !verify_password(&password, &user.password) {
        return Err(Error::InvalidCredentials);
    }

    keys.generate_session(&user)
}

/// Applies profile edits for `user`. A full update must carry `name`.
pub async fn update_profile(
    store: &dyn Store,
    user: &User,
    payload: ProfilePayload,
    partial: bool,
) -> Result<User, Error> {
    let mut errors = FieldErrors::default();

    let name = match payload.name {
        Some(name) => Some(check_text("name", name, true, &mut errors)),
        None if !partial => Some(required("name", None, &mut errors)),
        None => None,
    };
    if let Some(password) = &payload.password {
        check_password(password, &mut errors);
    }
    errors.into_result(())?;

    let changes = UserChanges {
        name,
        password: payload
            .password
            .as_deref()
            .map(hash_password)
            .transpose()?,
    };

    store
        .update_user(user.id, changes)
        .await?
        .ok_or(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn email_domain_is_lowercased() {
        let samples = [
            ("test1@example.COM", "test1@example.com"),
            ("Test2@EXAMPLE.COM", "Test2@example.com"),
            ("test3@Example.com", "test3@example.com"),
            ("TEST4@Example.com", "TEST4@example.com"),
        ];

        for (email, expected) in samples {
            assert_eq!(normalize_email(email), expected);
        }
    }

    #[test]
    fn email_without_domain_is_left_alone() {
        assert_eq!(normalize_email("Plain"), "Plain");
    }

    #[tokio::test]
    async fn create_user_normalizes_and_hashes() {
        let store = MemoryStore::new();
        let user = create_user(&store, "Test2@EXAMPLE.COM", "testtestuser", "")
            .await
            .unwrap();

        assert_eq!(user.email, "Test2@example.com");
        assert!(verify_password("testtestuser", &user.password));
        assert!(user.is_active);
        assert!(!user.is_staff && !user.is_superuser);
    }

    #[tokio::test]
    async fn empty_email_is_rejected() {
        let store = MemoryStore::new();
        let err = create_user(&store, "", "testtestuser", "").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn superuser_gets_elevated_flags() {
        let store = MemoryStore::new();
        let user = create_superuser(&store, "test@example.com", "testtestuser", "")
            .await
            .unwrap();

        assert!(user.is_superuser);
        assert!(user.is_staff);
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_insert() {
        let store = MemoryStore::new();
        let payload = RegisterPayload {
            email: Some("test1@example.com".to_owned()),
            password: Some("test".to_owned()),
            name: None,
        };

        let Err(Error::Validation(errors)) = register_user(&store, payload).await else {
            panic!("expected validation error");
        };
        assert!(errors.get("password").is_some());
        assert_eq!(
            store.get_user_by_email("test1@example.com").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let store = MemoryStore::new();
        let keys = SessionKeys::new(b"secret", 1).unwrap();
        create_user(&store, "test1@example.com", "testtestuser", "")
            .await
            .unwrap();

        let payload = CredentialsPayload {
            email: Some("test1@example.com".to_owned()),
            password: Some("testtestusermore".to_owned()),
        };
        let err = login_user(&store, &keys, payload).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }
}
