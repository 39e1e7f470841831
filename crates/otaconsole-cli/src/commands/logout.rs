//! Logout command implementation.

use anyhow::{Context as _, Result};

use super::Context;

/// Runs the logout command.
///
/// # Errors
///
/// Returns an error if the credentials file cannot be written.
pub fn run(ctx: &Context) -> Result<()> {
    let was_logged_in = ctx.session.is_logged_in();
    ctx.session
        .logout()
        .with_context(|| format!("Failed to clear {}", ctx.credentials_path().display()))?;

    if was_logged_in {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context_in;
    use tempfile::TempDir;

    #[test]
    fn test_logout_clears_credentials() {
        let dir = TempDir::new().unwrap();
        let ctx = context_in(&dir, None);
        ctx.session.login_with_api_key("abc123").unwrap();
        ctx.session.login_with_oauth_token("tok").unwrap();

        run(&ctx).unwrap();

        assert!(!context_in(&dir, None).session.is_logged_in());
    }

    #[test]
    fn test_logout_without_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context_in(&dir, None);
        run(&ctx).unwrap();
        assert!(!ctx.credentials_path().exists());
    }
}
