use async_trait::async_trait;
use sigflow_sip_core::{Message, Method};

use crate::error::MessageTermination;
use crate::step::{Step, StepContext};

/// Stops INVITEs that carry no session description
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireSessionDescription;

#[async_trait]
impl Step for RequireSessionDescription {
    fn name(&self) -> &str {
        "require-session-description"
    }

    async fn process(&self, message: &mut Message, _ctx: &StepContext) -> anyhow::Result<()> {
        if message.method() == Some(&Method::Invite) && message.session_description.is_none() {
            return Err(MessageTermination::because("INVITE without session description").into());
        }
        Ok(())
    }
}
