//! List users from every shard.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use super::{connect, print_user, Output};

pub async fn run(config: Option<&Path>, output: Output) -> Result<()> {
    let router = connect(config).await?;
    let gathered = router.list_all_users().await?;

    if output.json {
        return output.print_json(&gathered);
    }

    println!(
        "{} {} user(s) from {} shard(s):",
        "→".blue(),
        gathered.count.to_string().cyan(),
        router.shard_count()
    );
    println!();
    for user in &gathered.items {
        print_user(user, router.shard_index_of(user.user_id));
    }

    if let Some(partial) = &gathered.partial {
        println!();
        println!("{} Partial result:", "!".yellow().bold());
        for failure in &partial.failures {
            println!("  {} {}", "✗".red(), failure);
        }
    }

    Ok(())
}
