use anyhow::Result;
use portero::cli::{actions, actions::Action, start};

#[tokio::main]
async fn main() -> Result<()> {
    let (action, globals) = start()?;

    match action {
        Action::Server { .. } => actions::server::handle(action, &globals).await?,
    }

    Ok(())
}
