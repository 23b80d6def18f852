#![forbid(unsafe_code)]
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use muezzin::{
    cache, io,
    ledger::{DeliveryLedger, StoreLedger},
    model::{AlarmId, OffsetDirection, Prayer, Reminder, SoundSelection},
    resolver::ResolveOptions,
    rules::EnablementRule,
    scheduler::{AlarmScheduler, InMemoryFacility, SilentAudio, MAIN_SCAN_DAYS},
    storage::JsonFileStore,
    Settings, TimetableCalculator,
};
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

type CliScheduler = AlarmScheduler<JsonFileStore, TimetableCalculator, InMemoryFacility, SilentAudio>;

/// CLI du planificateur d'alarmes de prière
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Fichier JSON des réglages
    #[arg(long, global = true, default_value = "settings.json")]
    settings: String,

    /// Fichier JSON du stockage (cache, ledger, grille)
    #[arg(long, global = true, default_value = "muezzin-store.json")]
    store: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Horaires d'une journée
    Times {
        /// YYYY-MM-DD (défaut : aujourd'hui)
        #[arg(long)]
        date: Option<String>,
    },

    /// Horaires du mois, optionnellement exportés
    Month {
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        out_csv: Option<String>,
        #[arg(long)]
        out_json: Option<String>,
    },

    /// Prochaine occurrence
    Next {
        /// RFC3339 UTC (défaut : maintenant)
        #[arg(long)]
        from: Option<String>,
        /// Ignorer les règles d'activation
        #[arg(long)]
        all: bool,
        #[arg(long, default_value_t = MAIN_SCAN_DAYS)]
        scan_days: u8,
    },

    /// Armer l'adhan et les rappels
    Schedule {
        /// RFC3339 UTC (défaut : maintenant)
        #[arg(long)]
        now: Option<String>,
    },

    /// Congédier une alarme
    Dismiss {
        #[arg(long)]
        id: String,
        /// RFC3339 UTC
        #[arg(long)]
        at: String,
    },

    /// Modifier la règle d'une prière (`on`, `off`, `mon,wed,fri`)
    Rule {
        #[arg(long)]
        prayer: String,
        #[arg(long)]
        notify: Option<String>,
        #[arg(long)]
        sound: Option<String>,
    },

    /// Ajouter un rappel relatif à une prière
    AddReminder {
        #[arg(long)]
        prayer: String,
        #[arg(long)]
        minutes: u32,
        /// `before` ou `after`
        #[arg(long, default_value = "before")]
        direction: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        once: bool,
        /// `on` ou liste de jours
        #[arg(long)]
        days: Option<String>,
        #[arg(long)]
        sound_uri: Option<String>,
    },

    /// Supprimer un rappel
    RemoveReminder {
        #[arg(long)]
        id: String,
    },

    /// Importer une grille datée depuis un CSV
    ImportTimetable {
        #[arg(long)]
        csv: String,
    },

    /// Vider le cache des horaires et le ledger
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let mut settings = Settings::load(&cli.settings)?;
    let store = JsonFileStore::open(&cli.store)
        .with_context(|| format!("opening store {}", cli.store))?;

    let code = match cli.cmd {
        Commands::Times { date } => {
            let scheduler = build(store, settings)?;
            let day = match date {
                Some(raw) => parse_date(&raw)?,
                None => scheduler.cache().local_day(Utc::now())?,
            };
            let zone = scheduler.cache().zone()?;
            let times = scheduler.cache().get_day(day)?;
            println!("{}", times.date);
            for (prayer, at) in times.iter() {
                println!(
                    "{:<9} {} | {}",
                    prayer.display_name(),
                    at.with_timezone(&zone).format("%H:%M"),
                    at.to_rfc3339()
                );
            }
            0
        }
        Commands::Month {
            date,
            out_csv,
            out_json,
        } => {
            let scheduler = build(store, settings)?;
            let cache = scheduler.cache();
            let day = match date {
                Some(raw) => parse_date(&raw)?,
                None => cache.local_day(Utc::now())?,
            };
            let zone = cache.zone()?;
            let days = io::month_times(&cache, day)?;
            if let Some(path) = &out_json {
                io::export_month_json(path, &days)?;
            }
            if let Some(path) = &out_csv {
                io::export_month_csv(path, &days, zone)?;
            }
            if out_csv.is_none() && out_json.is_none() {
                io::write_month_csv(std::io::stdout().lock(), &days, zone)?;
            }
            0
        }
        Commands::Next {
            from,
            all,
            scan_days,
        } => {
            let scheduler = build(store, settings)?;
            let from = parse_instant(from.as_deref())?;
            let options = if all {
                ResolveOptions::bare(scan_days)
            } else {
                ResolveOptions::with_rules(scan_days)
            };
            match scheduler.resolve_next(from, &options)? {
                Some(found) => {
                    println!(
                        "{} | {} | sound={}",
                        found.prayer.display_name(),
                        found.at.to_rfc3339(),
                        found.play_sound
                    );
                    0
                }
                None => {
                    eprintln!("no occurrence within {scan_days} day(s)");
                    // Code 2 = rien à planifier
                    2
                }
            }
        }
        Commands::Schedule { now } => {
            let now = parse_instant(now.as_deref())?;
            let mut scheduler = build(store, settings)?;
            let adhan = scheduler.schedule_next(now)?;
            if adhan.occurrence().is_none() {
                eprintln!("adhan: {adhan:?}");
            }
            scheduler.schedule_reminders(now)?;
            // les rappels « une fois » viennent d'être désactivés
            scheduler.settings().save(&cli.settings)?;
            print_armed(&scheduler);
            0
        }
        Commands::Dismiss { id, at } => {
            let at = parse_instant(Some(at.as_str()))?;
            let mut scheduler = build(store, settings)?;
            scheduler.on_dismissed(&AlarmId::new(&id), at)?;
            scheduler.settings().save(&cli.settings)?;
            print_armed(&scheduler);
            0
        }
        Commands::Rule {
            prayer,
            notify,
            sound,
        } => {
            let prayer: Prayer = prayer.parse().map_err(anyhow::Error::msg)?;
            if notify.is_none() && sound.is_none() {
                bail!("nothing to change: pass --notify and/or --sound");
            }
            if let Some(raw) = notify {
                let rule = EnablementRule::parse(&raw).map_err(anyhow::Error::msg)?;
                settings.rules.set_notify(prayer, rule);
            }
            if let Some(raw) = sound {
                let rule = EnablementRule::parse(&raw).map_err(anyhow::Error::msg)?;
                settings.rules.set_sound(prayer, rule);
            }
            settings.save(&cli.settings)?;
            let rule = settings.rules.rule(prayer);
            println!("{prayer} | notify={:?} | sound={:?}", rule.notify, rule.sound);
            0
        }
        Commands::AddReminder {
            prayer,
            minutes,
            direction,
            label,
            once,
            days,
            sound_uri,
        } => {
            let prayer: Prayer = prayer.parse().map_err(anyhow::Error::msg)?;
            let direction: OffsetDirection = direction.parse().map_err(anyhow::Error::msg)?;
            let mut reminder = Reminder::new(prayer, minutes, direction);
            reminder.label = label;
            reminder.once = once;
            if let Some(raw) = days {
                reminder.days = EnablementRule::parse(&raw).map_err(anyhow::Error::msg)?;
            }
            reminder.sound = sound_uri.map(|uri| SoundSelection {
                id: "custom".to_string(),
                uri,
            });
            let id = reminder.id.clone();
            settings.save_reminder(reminder);
            settings.save(&cli.settings)?;
            println!("{}", id.as_str());
            0
        }
        Commands::RemoveReminder { id } => {
            if settings.delete_reminder(&id).is_none() {
                bail!("unknown reminder: {id}");
            }
            StoreLedger::new(&store).clear(&AlarmId::new(&id))?;
            settings.save(&cli.settings)?;
            0
        }
        Commands::ImportTimetable { csv } => {
            let rows = io::import_timetable_csv(&csv)?;
            let imported = io::store_timetable(&store, &rows)?;
            cache::invalidate_all(&store)?;
            println!("imported {imported} day(s)");
            0
        }
        Commands::Reset => {
            let cached = cache::invalidate_all(&store)?;
            let cleared = StoreLedger::new(&store).clear_all()?;
            println!("removed {cached} cached day(s), {cleared} ledger entries");
            0
        }
    };

    std::process::exit(code);
}

fn build(store: JsonFileStore, settings: Settings) -> Result<CliScheduler> {
    let calculator = io::load_timetable(&store)?;
    Ok(AlarmScheduler::new(
        store,
        calculator,
        InMemoryFacility::new(),
        SilentAudio,
        settings,
    ))
}

fn print_armed(scheduler: &CliScheduler) {
    for request in scheduler.facility().armed() {
        println!(
            "{} | {} | {} | {}",
            request.id,
            request.fire_at.to_rfc3339(),
            request.title,
            request.body.replace('\n', " / ")
        );
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").with_context(|| format!("invalid date: {raw}"))
}

fn parse_instant(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<DateTime<Utc>>()
            .with_context(|| format!("invalid RFC3339 instant: {raw}")),
        None => Ok(Utc::now()),
    }
}
