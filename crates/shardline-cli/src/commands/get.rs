//! Look up one user.

use anyhow::Result;
use std::path::Path;

use super::{connect, print_user, Output};

pub async fn run(config: Option<&Path>, user_id: i64, output: Output) -> Result<()> {
    let router = connect(config).await?;
    let routed = router.get_user(user_id).await?;

    if output.json {
        return output.print_json(&routed);
    }
    print_user(&routed.value, routed.shard);
    Ok(())
}
