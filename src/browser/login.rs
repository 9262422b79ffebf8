use crate::config::Credentials;
use std::time::Duration;
use tracing::info;

use super::{PageSession, SessionError, WaitCondition, WaitOutcome};

const LOGIN_LINK: &str = r#"a.nav-item.show-item[href="/user/login"]"#;
const LOGIN_DIALOG: &str = ".vp-dialog";
const EMAIL_INPUT: &str = r#"input[type="email"]"#;
const PASSWORD_INPUT: &str = r#"input[type="password"]"#;
const SUBMIT_BUTTON: &str = ".btn-positive";

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("login link did not appear within {0:?}")]
    LinkTimeout(Duration),

    #[error("login dialog did not open within {0:?}")]
    DialogTimeout(Duration),

    #[error("login dialog has no `{0}`")]
    MissingControl(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Sign in through the site's login dialog.
///
/// The link and the dialog are each waited for up to `timeout`; either one
/// missing, or any dialog control missing, fails the login.
pub async fn login<S: PageSession>(
    session: &S,
    base_url: &str,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<(), LoginError> {
    session.navigate(base_url).await?;

    let link = match session.wait_for(LOGIN_LINK, WaitCondition::Visible, timeout).await? {
        WaitOutcome::Found(link) => link,
        WaitOutcome::TimedOut => return Err(LoginError::LinkTimeout(timeout)),
    };
    session.click(&link).await?;

    let dialog = match session.wait_for(LOGIN_DIALOG, WaitCondition::Visible, timeout).await? {
        WaitOutcome::Found(dialog) => dialog,
        WaitOutcome::TimedOut => return Err(LoginError::DialogTimeout(timeout)),
    };

    info!("Attempting to log in as {}", credentials.email);
    let email = control(session, &dialog, EMAIL_INPUT).await?;
    let password = control(session, &dialog, PASSWORD_INPUT).await?;
    let submit = control(session, &dialog, SUBMIT_BUTTON).await?;

    session.send_keys(&email, &credentials.email).await?;
    session.send_keys(&password, &credentials.password).await?;
    session.click(&submit).await?;
    Ok(())
}

async fn control<S: PageSession>(
    session: &S,
    dialog: &S::Element,
    selector: &'static str,
) -> Result<S::Element, LoginError> {
    session
        .find(Some(dialog), selector)
        .await?
        .ok_or(LoginError::MissingControl(selector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fixture::FixtureSession;

    const HOME: &str = "https://www.viewpoint.ca";

    fn creds() -> Credentials {
        Credentials {
            email: "agent@example.com".into(),
            password: "s3cret".into(),
        }
    }

    #[tokio::test]
    async fn test_login_fills_dialog_and_submits() {
        let html = r#"<html><body>
            <nav><a class="nav-item show-item" href="/user/login">Log in</a></nav>
            <div class="vp-dialog">
              <input type="email"><input type="password">
              <button class="btn-positive">Sign in</button>
            </div>
        </body></html>"#;
        let session = FixtureSession::new().with_page(HOME, html);

        login(&session, HOME, &creds(), Duration::from_secs(1)).await.unwrap();

        let email_idx = session.element_index(r#"input[type="email"]"#).unwrap();
        let password_idx = session.element_index(r#"input[type="password"]"#).unwrap();
        let typed = session.typed.lock().unwrap().clone();
        assert_eq!(
            typed,
            vec![
                (email_idx, "agent@example.com".to_string()),
                (password_idx, "s3cret".to_string()),
            ]
        );

        let submit_idx = session.element_index(".btn-positive").unwrap();
        assert_eq!(session.clicks.lock().unwrap().last(), Some(&submit_idx));
    }

    #[tokio::test]
    async fn test_missing_login_link_is_fatal() {
        let session = FixtureSession::new().with_page(HOME, "<html><body></body></html>");
        let err = login(&session, HOME, &creds(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::LinkTimeout(_)));
    }

    #[test]
    fn test_dialog_that_never_opens_is_fatal() {
        let html = r#"<a class="nav-item show-item" href="/user/login">Log in</a>"#;
        let session = FixtureSession::new().with_page(HOME, html);
        let err = tokio_test::block_on(login(&session, HOME, &creds(), Duration::from_millis(10)))
            .unwrap_err();
        assert!(matches!(err, LoginError::DialogTimeout(_)));
        assert!(session.typed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dialog_without_password_field_is_fatal() {
        let html = r#"<html><body>
            <a class="nav-item show-item" href="/user/login">Log in</a>
            <div class="vp-dialog">
              <input type="email">
              <button class="btn-positive">Sign in</button>
            </div>
        </body></html>"#;
        let session = FixtureSession::new().with_page(HOME, html);
        let err = login(&session, HOME, &creds(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::MissingControl(PASSWORD_INPUT)));
        assert!(session.typed.lock().unwrap().is_empty());
    }
}
