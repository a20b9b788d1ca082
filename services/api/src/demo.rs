use crate::infra::{standing_roster, InMemoryCandidateRepository, TracingNotifier};
use clap::Args;
use scholar_panels::error::AppError;
use scholar_panels::workflows::interview::{
    Candidate, CandidateImporter, Mark, PanelAllocationService, PanelId, PanelRoster, Scope,
    ServiceSettings,
};
use std::path::PathBuf;
use std::sync::Arc;

type Console = PanelAllocationService<InMemoryCandidateRepository, TracingNotifier>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Candidate export (CSV). Defaults to ten generated registrations.
    #[arg(long)]
    pub(crate) candidates_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct AllocateArgs {
    /// Candidate export (CSV) with id,name,application_no,department headers
    #[arg(long)]
    pub(crate) candidates_csv: PathBuf,
    /// Number of panels to spread candidates over
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) panels: u32,
    /// Evaluators per generated panel (1-3)
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub(crate) evaluators: u8,
    /// Print rosters as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let candidates = match args.candidates_csv {
        Some(path) => CandidateImporter::from_path(path)?,
        None => demo_candidates(),
    };
    let (console, notifier) = console(candidates);

    println!("Interview panel console demo");
    for number in 1..=2 {
        console.create_panel(standing_roster(number, 2))?;
    }
    println!("\nTwo panels seated");
    render_rosters(&console.rosters()?);

    let pinned = console
        .rosters()?
        .first()
        .and_then(|roster| roster.entries.get(2))
        .map(|entry| entry.candidate_id.clone());
    if let Some(candidate) = &pinned {
        console.begin_edit(candidate)?;
        console.input_mark(candidate, 0, "28")?;
        let preview = console.input_mark(candidate, 1, "Ab")?;
        println!(
            "\nGraded {candidate}: marks {} -> average {}",
            join_marks(&preview.marks[..preview.evaluator_count]),
            preview.preview
        );
        console.commit_marks(candidate)?;
    }

    console.create_panel(standing_roster(3, 2))?;
    println!("\nThird panel seated; graded candidates stay where they were scored");
    render_rosters(&console.rosters()?);

    let report = console.forward_panel(PanelId(3), true)?;
    println!(
        "\nForwarded {}: {} sent, {} failed",
        report.panel,
        report.forwarded(),
        report.failed()
    );

    let notifications = notifier.drain();
    if !notifications.is_empty() {
        println!("\nNotifications");
        for notification in notifications {
            println!("  [{}] {}", notification.level.label(), notification.message);
        }
    }

    Ok(())
}

pub(crate) fn run_allocate(args: AllocateArgs) -> Result<(), AppError> {
    let AllocateArgs {
        candidates_csv,
        panels,
        evaluators,
        json,
    } = args;

    let candidates = CandidateImporter::from_path(candidates_csv)?;
    let (console, _) = console(candidates);
    for number in 1..=panels {
        console.create_panel(standing_roster(number, usize::from(evaluators)))?;
    }

    let rosters = console.rosters()?;
    if json {
        match serde_json::to_string_pretty(&rosters) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("Roster payload unavailable: {err}"),
        }
    } else {
        render_rosters(&rosters);
    }
    Ok(())
}

fn console(candidates: Vec<Candidate>) -> (Console, Arc<TracingNotifier>) {
    let repository = Arc::new(InMemoryCandidateRepository::seeded(candidates));
    let notifier = Arc::new(TracingNotifier::default());
    let settings = ServiceSettings::new(Scope::new("general", "general"));
    (
        PanelAllocationService::new(repository, notifier.clone(), settings),
        notifier,
    )
}

fn demo_candidates() -> Vec<Candidate> {
    [
        "Asha Nair",
        "Ravi Kumar",
        "Meena Pillai",
        "Karthik Menon",
        "Divya Rao",
        "Farhan Ali",
        "Gauri Shah",
        "Hari Prasad",
        "Isha Verma",
        "Joseph Mathew",
    ]
    .iter()
    .enumerate()
    .map(|(index, name)| {
        let n = index + 1;
        Candidate::registered(format!("s-{n:02}"), *name, format!("APP-{n:03}"), "Physics")
    })
    .collect()
}

fn render_rosters(rosters: &[PanelRoster]) {
    for roster in rosters {
        let examiners: Vec<&str> = roster
            .evaluators
            .iter()
            .map(|evaluator| evaluator.name.as_str())
            .collect();
        println!(
            "{} ({}) | {} candidates, {} graded",
            roster.label,
            examiners.join(", "),
            roster.entries.len(),
            roster.graded()
        );
        for entry in &roster.entries {
            println!(
                "  - {:<14} {:<8} marks [{}] avg {}{}",
                entry.name,
                entry.application_no,
                join_marks(&entry.marks),
                entry.average,
                if entry.forwarded { " (forwarded)" } else { "" }
            );
        }
    }
}

fn join_marks(marks: &[Mark]) -> String {
    marks
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
