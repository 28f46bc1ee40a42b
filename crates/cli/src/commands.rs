use anyhow::{bail, Context as _};
use budgetflow_core::{BudgetDocument, FinancialGoal, ItemKey, ItemType};
use budgetflow_planner::{DecisionEngine, PlannerConfig, ReviewAction, ReviewSession, TwinMatcher};
use budgetflow_storage::DbPool;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::path::Path;

pub struct Context {
    pub db: DbPool,
    pub config: PlannerConfig,
    pub user: String,
    pub today: NaiveDate,
}

/// One line of a decisions file.
#[derive(Debug, Deserialize)]
struct DecisionInput {
    #[serde(rename = "type")]
    item_type: ItemType,
    description: String,
    #[serde(rename = "compte")]
    account: String,
    action: ReviewAction,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn load(ctx: &Context) -> anyhow::Result<BudgetDocument> {
    budgetflow_storage::load_document(&ctx.db, &ctx.user)
        .await?
        .with_context(|| format!("No budget stored for {}; run `import` first", ctx.user))
}

async fn open_session(ctx: &Context) -> anyhow::Result<ReviewSession> {
    let document = load(ctx).await?;
    let goals = budgetflow_storage::get_goals(&ctx.db, &ctx.user).await?;
    let mut config = ctx.config.clone();
    if let Some(end) = budgetflow_storage::get_profile_end_date(&ctx.db, &ctx.user).await? {
        config.profile_end_date = Some(end);
    }
    let engine = DecisionEngine::new(ctx.today, &config, goals);
    Ok(ReviewSession::new(engine, document))
}

pub async fn import(ctx: &Context, file: &Path) -> anyhow::Result<()> {
    let mut document: BudgetDocument = read_json(file)?;
    document.validate()?;
    budgetflow_storage::save_document(&ctx.db, &ctx.user, &document).await?;
    println!(
        "Imported {} income, {} expense line(s), {} snapshot(s)",
        document.entrees.len(),
        document.sorties.len(),
        document.modifications.len()
    );
    Ok(())
}

pub async fn add_goal(
    ctx: &Context,
    account: &str,
    deadline: Option<NaiveDate>,
    priority: &str,
) -> anyhow::Result<()> {
    let goal = FinancialGoal::new(account, deadline, priority);
    budgetflow_storage::insert_goal(&ctx.db, &ctx.user, &goal).await?;
    println!("Goal added for {account} (rank {})", goal.rank());
    Ok(())
}

pub async fn set_profile_end(ctx: &Context, date: NaiveDate) -> anyhow::Result<()> {
    budgetflow_storage::set_profile_end_date(&ctx.db, &ctx.user, date).await?;
    println!("Profile end date set to {date}");
    Ok(())
}

pub async fn review(ctx: &Context) -> anyhow::Result<()> {
    let session = open_session(ctx).await?;
    let candidates = session.candidates();
    if candidates.is_empty() {
        println!("Nothing to review.");
        return Ok(());
    }
    for (item, decision) in candidates {
        let when = decision
            .proposed_date
            .map_or_else(|| "no date (cannot accept)".to_string(), |d| d.to_string());
        println!(
            "{:<7} {:<30} {:<12} {:>10} -> {:>10}  {}",
            item.item_type.to_string(),
            item.description,
            item.account,
            item.amount.to_string(),
            decision.new_amount.to_string(),
            when
        );
    }
    Ok(())
}

pub async fn twins(ctx: &Context) -> anyhow::Result<()> {
    let document = load(ctx).await?;
    let pairs = TwinMatcher::detection().pairs(&document.entrees, &document.sorties);
    if pairs.is_empty() {
        println!("No transfer pairs found.");
    }
    for (income, expense) in pairs {
        println!("{income} <-> {expense}");
    }
    Ok(())
}

pub async fn commit(ctx: &Context, decisions: &Path, dry_run: bool) -> anyhow::Result<()> {
    let inputs: Vec<DecisionInput> = read_json(decisions)?;
    let mut session = open_session(ctx).await?;
    for input in &inputs {
        let key = ItemKey::new(input.item_type, &input.description, &input.account);
        session
            .apply(&key, input.action)
            .with_context(|| format!("Cannot {:?} {key}", input.action))?;
    }

    let summary = session.summary();
    if summary.accepted == 0 && summary.cancelled == 0 {
        bail!("No accepted or cancelled decisions to commit");
    }

    let now = Utc::now();
    let outcome = session.commit(ctx.config.propagation, now);
    let disabled = outcome.disabled.len();
    let document = outcome.into_document(now);

    if dry_run {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    if let Err(e) = budgetflow_storage::save_document(&ctx.db, &ctx.user, &document).await {
        tracing::error!("Commit not saved, nothing was written: {e}");
        return Err(e.into());
    }
    println!(
        "Committed {} change(s), disabled {disabled} optimization(s); {} snapshot(s) total",
        summary.accepted,
        document.modifications.len()
    );
    Ok(())
}

pub async fn request(ctx: &Context, projection: &Path) -> anyhow::Result<()> {
    let days: Vec<serde_json::Value> = read_json(projection)?;
    let request = budgetflow_storage::create_optimization_request(&ctx.db, &ctx.user, &days).await?;
    println!("{}", serde_json::to_string(&request)?);
    Ok(())
}
