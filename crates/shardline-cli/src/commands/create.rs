//! Create a user on its owning shard.

use anyhow::Result;
use colored::Colorize;
use shardline_core::NewUser;
use std::path::Path;

use super::{connect, print_user, Output};

pub async fn run(
    config: Option<&Path>,
    user_id: i64,
    name: String,
    email: String,
    output: Output,
) -> Result<()> {
    let router = connect(config).await?;
    let created = router.create_user(NewUser::new(user_id, name, email)).await?;

    if output.json {
        return output.print_json(&created);
    }
    println!("{} Created user on {}", "✓".green().bold(), created.shard);
    print_user(&created.value, created.shard);
    Ok(())
}
