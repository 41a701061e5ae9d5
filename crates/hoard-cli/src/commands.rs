use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use hoard_sdk::{
    CharacterDirectory, CharacterId, Group, GroupDirectory, GroupId, Hoard, HoardConfig,
    InMemoryDirectory, InventoryItem, ItemCandidate, ItemCategory, ItemId, PartyInventory,
    PlayerCharacter, QuantityChange, UserRecord,
};
use hoard_types::{GroupMember, PermissionLevel};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cli::*;

const CONFIG_FILE: &str = "hoard.toml";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.data_dir.clone(), cli.config.clone())?;
    info!(
        data_dir = %config.storage.data_dir.display(),
        shrink_policy = %config.ledger.shrink_policy,
        "opening hoard"
    );
    let hoard = Hoard::open(config)
        .await
        .context("failed to open the data directory")?;
    let out = Output { format: cli.format };

    let result = match cli.command {
        Command::InitGroup(args) => cmd_init_group(&hoard, args).await,
        Command::Groups => cmd_groups(&hoard, out),
        Command::Add(args) => cmd_add(&hoard, args).await,
        Command::Quantity(args) => cmd_quantity(&hoard, args).await,
        Command::Remove(args) => cmd_remove(&hoard, args).await,
        Command::Claim(args) => cmd_claim(&hoard, args).await,
        Command::Return(args) => cmd_return(&hoard, args).await,
        Command::Set(args) => cmd_set(&hoard, args).await,
        Command::Show(args) => cmd_show(&hoard, args, out).await,
        Command::List(args) => cmd_list(&hoard, args, out).await,
        Command::Summary(args) => cmd_summary(&hoard, args, out).await,
        Command::Verify(args) => cmd_verify(&hoard, args).await,
        Command::Backup(args) => cmd_backup(&hoard, args).await,
        Command::Character(CharacterCommand::Add(args)) => cmd_character_add(&hoard, args).await,
        Command::Character(CharacterCommand::List(args)) => {
            cmd_character_list(&hoard, args, out).await
        }
    };

    hoard.shutdown().await;
    result
}

/// `--config` wins; otherwise `<data-dir>/hoard.toml` is read when it exists.
/// An explicit `--data-dir` overrides whatever the file says.
pub fn load_config(
    data_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<HoardConfig> {
    let mut config = match config_path {
        Some(path) => {
            debug!(config = %path.display(), "loading configuration");
            HoardConfig::load(&path)?
        }
        None => {
            let dir = data_dir
                .clone()
                .unwrap_or_else(|| HoardConfig::default().storage.data_dir);
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                debug!(config = %candidate.display(), "loading configuration");
                HoardConfig::load(&candidate)?
            } else {
                debug!(data_dir = %dir.display(), "no configuration file, using defaults");
                HoardConfig::default()
            }
        }
    };
    if let Some(dir) = data_dir {
        config.storage.data_dir = dir;
    }
    Ok(config)
}

#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
}

impl Output {
    /// Print `value` as JSON and return `true`, or return `false` for text output.
    fn json<T: Serialize>(&self, value: &T) -> anyhow::Result<bool> {
        if self.format != OutputFormat::Json {
            return Ok(false);
        }
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(true)
    }
}

// ── Lookups ───────────────────────────────────────────────────────

fn local(hoard: &Hoard) -> anyhow::Result<&Arc<InMemoryDirectory>> {
    hoard
        .local_directory()
        .ok_or_else(|| anyhow!("no local directory available"))
}

fn resolve_group(hoard: &Hoard, raw: &str) -> anyhow::Result<GroupId> {
    if let Ok(id) = raw.parse::<GroupId>() {
        return Ok(id);
    }
    let matches: Vec<Group> = hoard
        .groups()
        .into_iter()
        .filter(|g| g.name.eq_ignore_ascii_case(raw.trim()))
        .collect();
    match matches.as_slice() {
        [group] => Ok(group.id),
        [] => bail!("no group named {raw:?}"),
        _ => bail!("{} groups are named {raw:?}; use the id", matches.len()),
    }
}

async fn open(hoard: &Hoard, raw: &str) -> anyhow::Result<Arc<PartyInventory>> {
    let group_id = resolve_group(hoard, raw)?;
    Ok(hoard.open_group(group_id).await?)
}

fn resolve_item(inventory: &PartyInventory, raw: &str) -> anyhow::Result<InventoryItem> {
    if let Ok(id) = raw.parse::<ItemId>() {
        return inventory
            .item(&id)
            .ok_or_else(|| anyhow!("no item with id {id}"));
    }
    let matches: Vec<InventoryItem> = inventory
        .items()
        .into_iter()
        .filter(|item| item.name.eq_ignore_ascii_case(raw.trim()))
        .collect();
    match matches.as_slice() {
        [item] => Ok(item.clone()),
        [] => bail!("no item named {raw:?}"),
        _ => bail!("{} items are named {raw:?}; use the id", matches.len()),
    }
}

fn resolve_character(
    hoard: &Hoard,
    group_id: GroupId,
    raw: &str,
) -> anyhow::Result<PlayerCharacter> {
    let characters = local(hoard)?.characters_for_group(&group_id);
    if let Ok(id) = raw.parse::<CharacterId>() {
        return characters
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| anyhow!("no character with id {id} in this group"));
    }
    characters
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| anyhow!("no character named {raw:?} in this group"))
}

fn print_breakdown(inventory: &PartyInventory, item_id: &ItemId) {
    if let Some(breakdown) = inventory.breakdown(item_id) {
        println!("  {}", breakdown.to_string().dimmed());
    }
}

// ── Groups ────────────────────────────────────────────────────────

async fn cmd_init_group(hoard: &Hoard, args: InitGroupArgs) -> anyhow::Result<()> {
    let user = UserRecord::new(std::env::var("USER").unwrap_or_else(|_| "local".into()));
    hoard.register_user(user.clone()).await?;

    let mut group = Group::new(args.name);
    group.description = args.description.unwrap_or_default();
    group.members.push(GroupMember {
        user_id: user.id,
        permission: PermissionLevel::Owner,
    });
    let inventory = hoard.create_group(group).await?;

    println!(
        "{} Created group {}",
        "✓".green().bold(),
        inventory.name().bold()
    );
    println!("  Id: {}", inventory.group_id().to_string().cyan());
    Ok(())
}

fn cmd_groups(hoard: &Hoard, out: Output) -> anyhow::Result<()> {
    let groups = hoard.groups();
    if out.json(&groups)? {
        return Ok(());
    }
    if groups.is_empty() {
        println!("No groups.");
    }
    for group in groups {
        println!(
            "{}  {}  ({} characters)",
            group.id.short_id().cyan(),
            group.name.bold(),
            group.character_ids.len()
        );
    }
    Ok(())
}

async fn cmd_backup(hoard: &Hoard, args: GroupArgs) -> anyhow::Result<()> {
    let group_id = resolve_group(hoard, &args.group)?;
    match hoard.backup_group(group_id).await? {
        Some(path) => println!(
            "{} Backed up to {}",
            "✓".green().bold(),
            path.display().to_string().bold()
        ),
        None => println!("Nothing to back up: the group has never been saved."),
    }
    Ok(())
}

// ── Items ─────────────────────────────────────────────────────────

async fn cmd_add(hoard: &Hoard, args: AddArgs) -> anyhow::Result<()> {
    let inventory = open(hoard, &args.group).await?;
    let category: ItemCategory = args.category.parse()?;
    let mut candidate = ItemCandidate::new(args.name, category, args.quantity)
        .with_weight(args.weight)
        .with_value(args.value);
    if let Some(description) = args.description {
        candidate = candidate.with_description(description);
    }

    let outcome = inventory.add_item(candidate)?.persisted().await?;
    let verb = if outcome.merged { "Merged into" } else { "Added" };
    println!(
        "{} {} {} ({}) x{}",
        "✓".green().bold(),
        verb,
        outcome.item.name.bold(),
        outcome.item.category,
        outcome.item.quantity
    );
    println!("  Id: {}", outcome.item.id.to_string().cyan());
    Ok(())
}

async fn cmd_quantity(hoard: &Hoard, args: QuantityArgs) -> anyhow::Result<()> {
    let inventory = open(hoard, &args.group).await?;
    let item = resolve_item(&inventory, &args.item)?;

    match inventory
        .update_quantity(item.id, args.quantity)?
        .persisted()
        .await?
    {
        QuantityChange::Updated { item, plan } => {
            println!(
                "{} {} quantity set to {}",
                "✓".green().bold(),
                item.name.bold(),
                item.quantity
            );
            for release in &plan.releases {
                println!(
                    "  {} {} unit(s) returned to party storage from {}",
                    "!".yellow(),
                    release.released(),
                    release.character_id.short_id()
                );
            }
            print_breakdown(&inventory, &item.id);
        }
        QuantityChange::Deleted(deleted) => {
            println!(
                "{} {} deleted ({} claim(s) removed)",
                "✓".green().bold(),
                deleted.item.name.bold(),
                deleted.purged.len()
            );
        }
    }
    Ok(())
}

async fn cmd_remove(hoard: &Hoard, args: ItemArgs) -> anyhow::Result<()> {
    let inventory = open(hoard, &args.group).await?;
    let item = resolve_item(&inventory, &args.item)?;
    let Some(committed) = inventory.delete_item(item.id) else {
        println!("{} is already gone.", item.name.bold());
        return Ok(());
    };
    let deleted = committed.persisted().await?;
    println!(
        "{} Removed {} ({} claim(s) removed)",
        "✓".green().bold(),
        deleted.item.name.bold(),
        deleted.purged.len()
    );
    Ok(())
}

async fn cmd_show(hoard: &Hoard, args: ItemArgs, out: Output) -> anyhow::Result<()> {
    let inventory = open(hoard, &args.group).await?;
    let item = resolve_item(&inventory, &args.item)?;
    let breakdown = inventory
        .breakdown(&item.id)
        .ok_or_else(|| anyhow!("no item with id {}", item.id))?;
    if out.json(&breakdown)? {
        return Ok(());
    }

    println!("{} ({})", item.name.bold(), item.category);
    println!("  Id:       {}", item.id.to_string().cyan());
    println!("  Quantity: {}", item.quantity);
    if item.weight > 0.0 {
        println!("  Weight:   {} each, {} total", item.weight, item.total_weight());
    }
    if item.value > 0.0 {
        println!("  Value:    {} each, {} total", item.value, item.total_value());
    }
    if !item.description.is_empty() {
        println!("  {}", item.description.dimmed());
    }
    println!("  Holders:  {}", breakdown);
    Ok(())
}

async fn cmd_list(hoard: &Hoard, args: GroupArgs, out: Output) -> anyhow::Result<()> {
    let inventory = open(hoard, &args.group).await?;
    let breakdowns = inventory.breakdowns();
    if out.json(&breakdowns)? {
        return Ok(());
    }

    println!("{}", inventory.name().bold());
    if breakdowns.is_empty() {
        println!("  No items.");
    }
    for breakdown in breakdowns {
        println!(
            "  {:>4}  {}  {}",
            breakdown.quantity,
            breakdown.item_name.bold(),
            breakdown.to_string().dimmed()
        );
    }
    Ok(())
}

async fn cmd_summary(hoard: &Hoard, args: GroupArgs, out: Output) -> anyhow::Result<()> {
    let inventory = open(hoard, &args.group).await?;
    let summary = inventory.summary();
    if out.json(&summary)? {
        return Ok(());
    }

    println!("{}", inventory.name().bold());
    println!("  Items:         {}", summary.item_count);
    println!("  Units:         {}", summary.total_units);
    println!("  Weight:        {:.1}", summary.total_weight);
    println!("  Value:         {:.2}", summary.total_value);
    println!(
        "  Party storage: {} unit(s), {:.1} weight",
        summary.party_storage_units, summary.party_storage_weight
    );
    for load in &summary.per_character {
        let name = local(hoard)?
            .character(&load.character_id)
            .map(|c| c.name)
            .unwrap_or_else(|| load.character_id.short_id());
        println!(
            "  {:<14} {} unit(s), {:.1} weight, {:.2} value",
            format!("{name}:"),
            load.units,
            load.weight,
            load.value
        );
    }
    Ok(())
}

async fn cmd_verify(hoard: &Hoard, args: GroupArgs) -> anyhow::Result<()> {
    let inventory = open(hoard, &args.group).await?;
    let report = inventory.audit();
    if report.is_consistent() {
        println!("{} Allocations are consistent", "✓".green().bold());
        println!("  Items:   {}", report.item_count);
        println!("  Claims:  {}", report.record_count);
        return Ok(());
    }

    warn!(
        group = %inventory.group_id(),
        violations = report.violations.len(),
        "allocation audit failed"
    );
    println!(
        "{} {} violation(s) found",
        "✗".red().bold(),
        report.violations.len()
    );
    for violation in &report.violations {
        println!("  {:?}: {}", violation.kind, violation.description);
    }
    bail!("inventory of {} is inconsistent", inventory.name())
}

// ── Ownership ─────────────────────────────────────────────────────

async fn cmd_claim(hoard: &Hoard, args: ClaimArgs) -> anyhow::Result<()> {
    let inventory = open(hoard, &args.group).await?;
    let item = resolve_item(&inventory, &args.item)?;
    let character = resolve_character(hoard, inventory.group_id(), &args.character)?;

    let record = inventory
        .assign(item.id, character.id, args.quantity, args.notes.as_deref())?
        .persisted()
        .await?;
    println!(
        "{} {} now holds {} {}",
        "✓".green().bold(),
        character.name.bold(),
        record.quantity_owned,
        item.name
    );
    print_breakdown(&inventory, &item.id);
    Ok(())
}

async fn cmd_return(hoard: &Hoard, args: ReturnArgs) -> anyhow::Result<()> {
    let inventory = open(hoard, &args.group).await?;
    let item = resolve_item(&inventory, &args.item)?;
    let character = resolve_character(hoard, inventory.group_id(), &args.character)?;

    let Some(committed) = inventory.return_to_party(item.id, character.id) else {
        println!("{} holds no {}.", character.name.bold(), item.name);
        return Ok(());
    };
    let record = committed.persisted().await?;
    println!(
        "{} {} returned {} {} to party storage",
        "✓".green().bold(),
        character.name.bold(),
        record.quantity_owned,
        item.name
    );
    print_breakdown(&inventory, &item.id);
    Ok(())
}

async fn cmd_set(hoard: &Hoard, args: SetArgs) -> anyhow::Result<()> {
    let inventory = open(hoard, &args.group).await?;
    let item = resolve_item(&inventory, &args.item)?;
    let character = resolve_character(hoard, inventory.group_id(), &args.character)?;

    inventory
        .set_ownership(item.id, character.id, args.quantity)?
        .persisted()
        .await?;
    println!(
        "{} {} holds {} {}",
        "✓".green().bold(),
        character.name.bold(),
        args.quantity,
        item.name
    );
    print_breakdown(&inventory, &item.id);
    Ok(())
}

// ── Characters ────────────────────────────────────────────────────

async fn cmd_character_add(hoard: &Hoard, args: CharacterAddArgs) -> anyhow::Result<()> {
    let directory = local(hoard)?;
    let inventory = open(hoard, &args.group).await?;
    let group_id = inventory.group_id();
    let mut group = directory
        .group(&group_id)
        .ok_or_else(|| anyhow!("group {group_id} is not in the registry"))?;

    let owner = match group
        .members
        .iter()
        .find(|m| m.permission == PermissionLevel::Owner)
    {
        Some(member) => member.user_id,
        None => {
            let user = UserRecord::new("local");
            hoard.register_user(user.clone()).await?;
            user.id
        }
    };

    let character = PlayerCharacter::new(args.name, owner).with_class(args.class, args.level);
    directory.insert_character(character.clone());
    group.character_ids.push(character.id);
    hoard.register_group(group).await?;
    inventory.refresh_character_snapshot().persisted().await?;

    println!(
        "{} Added {} to {}",
        "✓".green().bold(),
        character.name.bold(),
        inventory.name().bold()
    );
    println!("  Id: {}", character.id.to_string().cyan());
    Ok(())
}

async fn cmd_character_list(hoard: &Hoard, args: GroupArgs, out: Output) -> anyhow::Result<()> {
    let inventory = open(hoard, &args.group).await?;
    let characters = local(hoard)?.characters_for_group(&inventory.group_id());
    if out.json(&characters)? {
        return Ok(());
    }
    if characters.is_empty() {
        println!("No characters in {}.", inventory.name().bold());
    }
    for character in characters {
        let carried: u64 = inventory
            .carried_by(&character.id)
            .iter()
            .map(|r| u64::from(r.quantity_owned))
            .sum();
        let class = if character.character_class.is_empty() {
            String::new()
        } else {
            format!(" {} {}", character.character_class, character.level)
        };
        println!(
            "{}  {}{}  carrying {} unit(s)",
            character.id.short_id().cyan(),
            character.name.bold(),
            class,
            carried
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_flag_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path().to_path_buf()), None).unwrap();
        assert_eq!(config.storage.data_dir, dir.path());
    }

    #[test]
    fn config_file_in_data_dir_is_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[ledger]\nshrink_policy = \"proportional\"\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path().to_path_buf()), None).unwrap();
        assert_eq!(
            config.ledger.shrink_policy,
            hoard_sdk::ShrinkPolicy::Proportional
        );
        assert_eq!(config.storage.data_dir, dir.path());
    }

    #[test]
    fn key_length_below_a_uuid_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[storage]\nmax_key_len = 8\n").unwrap();
        let err = load_config(Some(dir.path().to_path_buf()), None).unwrap_err();
        assert!(err.to_string().contains("max_key_len"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(None, Some(dir.path().join("absent.toml"))).is_err());
    }
}
