use async_trait::async_trait;
use geoweather_core::PermissionPrompt;

/// Asks on the terminal. Any prompt failure (including Ctrl-C) counts as "no".
#[derive(Debug)]
pub struct ConsolePrompt;

#[async_trait]
impl PermissionPrompt for ConsolePrompt {
    async fn ask(&self) -> bool {
        let answer = tokio::task::spawn_blocking(|| {
            inquire::Confirm::new("Allow geoweather to use your approximate location?")
                .with_default(true)
                .with_help_message("Your public IP address is sent to a geolocation service")
                .prompt()
        })
        .await;

        match answer {
            Ok(Ok(allowed)) => allowed,
            Ok(Err(e)) => {
                tracing::warn!("Permission prompt failed: {}", e);
                false
            }
            Err(e) => {
                tracing::warn!("Permission prompt task failed: {}", e);
                false
            }
        }
    }
}
