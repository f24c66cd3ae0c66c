use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use mentor_splitter::archive::safe_file_name;
use mentor_splitter::{Config, GroupFilter, Session, SplitError, UnmatchedRowPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn file_arg() -> Arg {
    Arg::new("file")
        .value_name("FILE")
        .help("Roster workbook (.xlsx)")
        .required(true)
}

fn primary_arg() -> Arg {
    Arg::new("primary")
        .short('p')
        .long("primary")
        .value_name("VALUE")
        .help("Only consider rows of this primary group (\"All\" for every row)")
}

fn group_arg() -> Arg {
    Arg::new("group")
        .short('g')
        .long("group")
        .value_name("NAME")
        .help("Secondary group (mentor) to select")
        .required(true)
}

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("DIR")
        .help("Output directory (defaults to output_directory from the config)")
}

/// Config fields that can be set per run: (argument id, long flag, help).
const OVERRIDES: [(&str, &str, &str); 6] = [
    ("identifier_column", "identifier-column", "Header of the identifier column"),
    ("link_column", "link-column", "Header of the form link column"),
    ("primary_group_column", "primary-column", "Header of the primary group (team lead) column"),
    ("secondary_group_column", "secondary-column", "Header of the secondary group (mentor) column"),
    ("period_label", "period", "Period label used in archive entry names"),
    ("sheet_name", "sheet-name", "Name of the sheet in generated workbooks"),
];

fn override_args() -> Vec<Arg> {
    let mut args: Vec<Arg> = OVERRIDES
        .iter()
        .map(|(id, long, help)| {
            Arg::new(*id)
                .long(*long)
                .value_name("TEXT")
                .help(*help)
                .global(true)
        })
        .collect();
    args.push(
        Arg::new("unmatched_rows")
            .long("unmatched")
            .value_name("POLICY")
            .help("Formatting for records missing from the source sheet")
            .value_parser(["template", "default", "error"])
            .global(true),
    );
    args
}

/// Apply command line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut Config, matches: &ArgMatches) {
    let fields = [
        ("identifier_column", &mut config.identifier_column),
        ("link_column", &mut config.link_column),
        ("primary_group_column", &mut config.primary_group_column),
        ("secondary_group_column", &mut config.secondary_group_column),
        ("period_label", &mut config.period_label),
        ("sheet_name", &mut config.sheet_name),
    ];
    for (id, field) in fields {
        if let Some(value) = matches.get_one::<String>(id) {
            *field = value.clone();
        }
    }
    if let Some(policy) = matches.get_one::<String>("unmatched_rows") {
        config.unmatched_rows = match policy.as_str() {
            "default" => UnmatchedRowPolicy::DefaultFormat,
            "error" => UnmatchedRowPolicy::Error,
            _ => UnmatchedRowPolicy::TemplateRow,
        };
    }
}

fn cli() -> Command {
    Command::new("mentor-splitter")
        .version("0.1.0")
        .about("Splits a roster workbook into formatted per-mentor workbooks")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .args(override_args())
        .subcommand(Command::new("init-config").about("Write the default configuration file"))
        .subcommand(
            Command::new("groups")
                .about("List primary groups and the secondary groups under the filter")
                .arg(file_arg())
                .arg(primary_arg()),
        )
        .subcommand(
            Command::new("preview")
                .about("Print one group's records as CSV")
                .arg(file_arg())
                .arg(group_arg())
                .arg(primary_arg()),
        )
        .subcommand(
            Command::new("split")
                .about("Write one formatted workbook for a group")
                .arg(file_arg())
                .arg(group_arg())
                .arg(primary_arg())
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("archive")
                .about("Write a zip with one formatted workbook per group")
                .arg(file_arg())
                .arg(primary_arg())
                .arg(output_arg()),
        )
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    if let Some(("init-config", _)) = matches.subcommand() {
        Config::default()
            .save_to_file(config_file)
            .with_context(|| format!("failed to write {}", config_file))?;
        println!("📝 Default configuration written to: {}", config_file);
        return Ok(());
    }

    let mut config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)
            .with_context(|| format!("failed to load {}", config_file))?
    } else {
        Config::default()
    };
    apply_overrides(&mut config, &matches);

    let Some((command, args)) = matches.subcommand() else {
        bail!("no command given");
    };

    let file = args
        .get_one::<String>("file")
        .context("missing roster file")?;
    let session = open_session(Path::new(file), config)?;
    let filter = GroupFilter::from_selection(args.get_one::<String>("primary").map(String::as_str));

    match command {
        "groups" => list_groups(&session, &filter),
        "preview" => preview(&session, &filter, args),
        "split" => split(&session, &filter, args),
        "archive" => archive(&session, &filter, args),
        other => bail!("unknown command '{}'", other),
    }
}

fn open_session(path: &Path, config: Config) -> Result<Session> {
    println!("📂 Reading roster: {}", path.display());
    match Session::open(path, config) {
        Ok(session) => {
            println!(
                "   ✅ {} rows, sheet '{}'",
                session.records().len(),
                session.source().name
            );
            Ok(session)
        }
        Err(SplitError::MissingColumns { columns }) => {
            println!("❌ Required columns missing! Make sure {} exist.", columns.join(", "));
            std::process::exit(2);
        }
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn list_groups(session: &Session, filter: &GroupFilter) -> Result<()> {
    let config = session.config();

    println!("\n👥 {} values:", config.primary_group_column);
    for group in session.primary_groups() {
        println!("   • {}", group);
    }

    let secondary = session.secondary_groups(filter);
    println!("\n🧑‍🏫 {} values ({}):", config.secondary_group_column, describe(filter));
    for group in &secondary {
        let count = session.group_records(filter, group).len();
        println!("   • {} ({} students)", group, count);
    }
    if secondary.is_empty() {
        println!("   (none)");
    }
    Ok(())
}

fn preview(session: &Session, filter: &GroupFilter, args: &ArgMatches) -> Result<()> {
    let group = selected_group(session, filter, args)?;
    let records = session.group_records(filter, group);
    eprintln!("📋 Students under {} ({} students)", group, records.len());
    records
        .write_csv(std::io::stdout().lock())
        .context("failed to write preview")?;
    Ok(())
}

fn split(session: &Session, filter: &GroupFilter, args: &ArgMatches) -> Result<()> {
    let group = selected_group(session, filter, args)?;
    let records = session.group_records(filter, group);
    let output_dir = output_directory(session, args)?;

    let bytes = session
        .build_workbook(&records)
        .with_context(|| format!("failed to build workbook for {}", group))?;
    let path = output_dir.join(format!("{}.{}", safe_file_name(group), session.extension()));
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;

    println!("📄 Formatted workbook for {} ({} students): {}", group, records.len(), path.display());
    Ok(())
}

fn archive(session: &Session, filter: &GroupFilter, args: &ArgMatches) -> Result<()> {
    let output_dir = output_directory(session, args)?;

    println!("📦 Building archive ({})", describe(filter));
    let report = session.build_archive(filter).context("failed to build archive")?;
    let path = output_dir.join(&session.config().archive_name);
    fs::write(&path, &report.bytes).with_context(|| format!("failed to write {}", path.display()))?;

    for group in &report.built {
        println!("   ✅ {}", group);
    }
    for failure in &report.failed {
        println!("   ⚠️  {}", failure);
    }
    println!(
        "📦 Archive written: {} ({} workbooks, {} failed)",
        path.display(),
        report.built.len(),
        report.failed.len()
    );
    Ok(())
}

fn selected_group<'a>(session: &Session, filter: &GroupFilter, args: &'a ArgMatches) -> Result<&'a str> {
    let group = args
        .get_one::<String>("group")
        .map(String::as_str)
        .context("missing --group")?;
    if !session.secondary_groups(filter).iter().any(|g| g == group) {
        bail!(
            "no {} named '{}' ({})",
            session.config().secondary_group_column,
            group,
            describe(filter)
        );
    }
    Ok(group)
}

fn output_directory(session: &Session, args: &ArgMatches) -> Result<PathBuf> {
    let dir = args
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&session.config().output_directory));
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    Ok(dir)
}

fn describe(filter: &GroupFilter) -> String {
    match filter {
        GroupFilter::All => "all rows".to_string(),
        GroupFilter::Only(value) => format!("filtered to {}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_override_config_values() {
        let matches = cli()
            .try_get_matches_from([
                "mentor-splitter",
                "groups",
                "roster.xlsx",
                "--identifier-column",
                "Student ID",
                "--secondary-column",
                "Mentor",
                "--period",
                "Spring 2026",
                "--unmatched",
                "error",
            ])
            .unwrap();

        let mut config = Config::default();
        apply_overrides(&mut config, &matches);

        assert_eq!(
            config,
            Config {
                identifier_column: "Student ID".into(),
                secondary_group_column: "Mentor".into(),
                period_label: "Spring 2026".into(),
                unmatched_rows: UnmatchedRowPolicy::Error,
                ..Config::default()
            }
        );
    }

    #[test]
    fn config_is_untouched_without_flags() {
        let matches = cli()
            .try_get_matches_from(["mentor-splitter", "archive", "roster.xlsx"])
            .unwrap();
        let mut config = Config::default();
        apply_overrides(&mut config, &matches);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn unknown_policies_are_rejected() {
        assert!(cli()
            .try_get_matches_from(["mentor-splitter", "groups", "r.xlsx", "--unmatched", "skip"])
            .is_err());
    }
}
