use anyhow::Context;
use clap::{value_parser, Arg, ArgMatches, Command};
use keydev_workflow::prelude::*;
use keydev_workflow::{telemetry, NotificationWorker, TracingSink, WorkflowConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("keydev")
        .version(keydev_workflow::VERSION)
        .about("KeyDev workflow core")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("demo")
                .about("Walk a KeyDev through the full pipeline on the in-memory store")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("month")
                        .long("month")
                        .default_value("2026-01")
                        .help("Budget month (YYYY-MM)"),
                )
                .arg(
                    Arg::new("max-alloc")
                        .long("max-alloc")
                        .default_value("2")
                        .value_parser(value_parser!(u32))
                        .help("Allocation ceiling for the demo team"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Load and validate a configuration file")
                .arg(
                    Arg::new("path")
                        .long("path")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                ),
        );

    match cli.get_matches().subcommand() {
        Some(("demo", args)) => run_demo(args).await,
        Some(("check-config", args)) => check_config(args),
        _ => Ok(()),
    }
}

fn check_config(args: &ArgMatches) -> anyhow::Result<()> {
    let path = args
        .get_one::<PathBuf>("path")
        .context("--path is required")?;
    let config = WorkflowConfig::load(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn run_demo(args: &ArgMatches) -> anyhow::Result<()> {
    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    };
    telemetry::init(config.log_format, &config.log_filter)?;

    let month: MonthRef = args
        .get_one::<String>("month")
        .context("--month has a default")?
        .parse()?;
    let max_alloc = *args
        .get_one::<u32>("max-alloc")
        .context("--max-alloc has a default")?;

    let (queue, rx) = NotificationQueue::bounded(config.notification_queue_capacity);
    let worker = NotificationWorker::spawn(rx, Arc::new(TracingSink));
    let service = KeyDevService::new(Arc::new(MemoryStore::new()), queue);

    let admin = Caller::new("admin", RoleSet::of([Role::Admin]));
    let requester = Caller::new("u1", RoleSet::of([Role::Requester])).with_dept("D");
    let tech = Caller::new("tv1", RoleSet::of([Role::TechValidator])).with_dept("D");
    let business = Caller::new("bv1", RoleSet::of([Role::BusinessValidator])).with_dept("D");

    service.set_budget_allocation(
        Some(&admin),
        BudgetAllocation::new(month.clone(), "D", "T", max_alloc),
    )?;
    service.add_question_template(Some(&admin), QuestionTemplate::new("Scope agreed?", 1))?;

    let kd = service.create_key_dev(Some(&requester), NewKeyDev::new("CSV export", "D", "T"))?;
    service.update_draft(
        Some(&requester),
        kd.id,
        DraftUpdate::default().with_mockup_repo_url("https://git.example/mockups/csv"),
    )?;
    service.transition(
        Some(&tech),
        &TransitionRequest::new(kd.id, KeyDevStatus::Approved).with_weight(Weight::Half),
    )?;
    service.transition(
        Some(&business),
        &TransitionRequest::new(kd.id, KeyDevStatus::FrontValidated)
            .with_month_ref(month.clone())
            .with_validated_mockup_commit("4f2a9c1"),
    )?;
    service.transition(
        Some(&tech),
        &TransitionRequest::new(kd.id, KeyDevStatus::InProgress),
    )?;

    let usage = service.slot_usage(
        Some(&admin),
        &AllocationKey::new(month, "D".into(), "T".into()),
    )?;

    for question in service.start_question_phase(Some(&tech), kd.id, None)? {
        let answer = service.create_answer(
            Some(&requester),
            question.id,
            "Yes, signed off",
            RecipientRole::Owner,
        )?;
        service.validate_answer(Some(&tech), question.id, answer.id)?;
    }

    let record = service.get_key_dev(Some(&admin), kd.id)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    println!("{}", serde_json::to_string_pretty(&usage)?);

    drop(service);
    let delivered = worker.await?;
    tracing::info!(delivered, "demo finished");
    Ok(())
}
