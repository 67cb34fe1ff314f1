#![forbid(unsafe_code)]
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use reserva::{
    io,
    model::{BookingId, BookingSlot, Database, OfferedServiceId, ServiceTypeId, UserId},
    notification::{LogNotifier, Notifier, OutboxNotifier},
    storage::{JsonStorage, Storage},
    BookingRequest, IdentityResolver, Marketplace, NewOfferedService, TokenTable,
};
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// CLI du moteur de réservation (base JSON locale)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Fichier JSON de la base
    #[arg(long, global = true, default_value = "reserva.json")]
    db: String,

    /// Table de jetons JSON `{"jeton": user_id}`
    #[arg(long, global = true)]
    tokens: Option<String>,

    /// Jeton de l'acteur courant
    #[arg(long, global = true)]
    token: Option<String>,

    /// Boîte d'envoi JSON-lines pour les notifications (sinon journalisées)
    #[arg(long, global = true)]
    outbox: Option<String>,

    /// Horloge figée "YYYY-MM-DD HH:MM" (heure locale par défaut)
    #[arg(long, global = true)]
    now: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insérer les états de réservation manquants
    SeedStates,

    /// Créer un utilisateur
    AddUser {
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        email: Option<String>,
    },

    /// Créer un type de service du catalogue
    AddServiceType {
        #[arg(long)]
        name: String,
    },

    /// Importer des services offerts depuis un CSV (acteur = travailleur)
    ImportServices {
        #[arg(long)]
        csv: String,
    },

    /// Offrir un service (acteur = travailleur)
    AddService {
        #[arg(long)]
        service_type: i64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        price: Option<f64>,
    },

    /// Supprimer un service offert et son horaire
    RemoveService {
        #[arg(long)]
        service: i64,
    },

    /// Valider puis enregistrer l'horaire d'un service depuis un fichier JSON
    SaveSchedule {
        #[arg(long)]
        service: i64,
        #[arg(long)]
        file: String,
    },

    /// Vérifier un horaire sans l'enregistrer
    CheckSchedule {
        #[arg(long)]
        file: String,
        /// Service dont l'horaire est remplacé (exclu de la comparaison)
        #[arg(long)]
        exclude: Option<i64>,
    },

    /// Afficher l'horaire d'un service
    ShowSchedule {
        #[arg(long)]
        service: i64,
    },

    /// Vérifier la disponibilité d'un créneau
    CheckSlot {
        #[arg(long)]
        service: i64,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// HH:MM
        #[arg(long)]
        start: String,
        /// HH:MM
        #[arg(long)]
        end: String,
    },

    /// Heures de début déjà prises pour une date
    Occupied {
        #[arg(long)]
        service: i64,
        #[arg(long)]
        date: String,
    },

    /// Demander une réservation (acteur = client)
    Book {
        #[arg(long)]
        service: i64,
        #[arg(long)]
        date: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        note: Option<String>,
    },

    /// Accepter une demande (acteur = travailleur)
    Confirm {
        #[arg(long)]
        booking: i64,
    },

    /// Refuser une demande (acteur = travailleur)
    Reject {
        #[arg(long)]
        booking: i64,
    },

    /// Démarrer le service (acteur = travailleur)
    Start {
        #[arg(long)]
        booking: i64,
    },

    /// Terminer le service (acteur = travailleur)
    Complete {
        #[arg(long)]
        booking: i64,
    },

    /// Annuler une réservation (acteur = client)
    Cancel {
        #[arg(long)]
        booking: i64,
    },

    /// Noter une réservation terminée (acteur = client)
    Rate {
        #[arg(long)]
        booking: i64,
        #[arg(long)]
        score: u8,
        #[arg(long)]
        comment: Option<String>,
    },

    /// Retirer le travailleur courant de la plateforme
    RetireWorker,

    /// Lister les réservations de l'acteur et optionnellement exporter
    List {
        #[arg(long)]
        out_json: Option<String>,
        #[arg(long)]
        out_csv: Option<String>,
    },
}

fn actor(cli: &Cli) -> Result<UserId> {
    let path = cli
        .tokens
        .as_deref()
        .context("--tokens is required for this command")?;
    let token = cli
        .token
        .as_deref()
        .context("--token is required for this command")?;
    let table = TokenTable::load(path)?;
    Ok(table.resolve_subject(token)?)
}

fn clock(cli: &Cli) -> Result<NaiveDateTime> {
    match &cli.now {
        Some(raw) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
            .with_context(|| format!("invalid --now value: {raw}")),
        None => Ok(Local::now().naive_local()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let storage = JsonStorage::open(&cli.db)?;
    // base absente : nouvelle base amorcée ; base illisible : erreur
    let mut db = if storage.path().exists() {
        storage.load()?
    } else {
        Database::seeded()
    };

    if let Commands::SeedStates = cli.cmd {
        db.seed_states();
        storage.save(&db)?;
        for row in &db.booking_states {
            println!("{} | {}", row.id, row.name);
        }
        return Ok(());
    }

    let notifier: Box<dyn Notifier> = match &cli.outbox {
        Some(path) => Box::new(OutboxNotifier::open(path)),
        None => Box::new(LogNotifier::new()),
    };
    let market = Marketplace::with_database(storage, db, notifier)?;
    let now = clock(&cli)?;

    let code = match &cli.cmd {
        Commands::SeedStates => 0,
        Commands::AddUser {
            first_name,
            last_name,
            email,
        } => {
            let id = market.add_user(first_name, last_name, email.clone())?;
            println!("{id}");
            0
        }
        Commands::AddServiceType { name } => {
            let id = market.add_service_type(name)?;
            println!("{id}");
            0
        }
        Commands::ImportServices { csv } => {
            let worker = actor(&cli)?;
            let rows = io::import_services_csv(csv)?;
            let created = market.import_services(worker, rows, now)?;
            println!("Imported {} service(s)", created.len());
            0
        }
        Commands::AddService {
            service_type,
            description,
            price,
        } => {
            let worker = actor(&cli)?;
            let service = market.create_service(
                worker,
                NewOfferedService {
                    service_type_id: ServiceTypeId::new(*service_type),
                    description: description.clone(),
                    observations: None,
                    hourly_price: *price,
                    images: Vec::new(),
                },
                now,
            )?;
            println!("{}", service.id);
            0
        }
        Commands::RemoveService { service } => {
            let worker = actor(&cli)?;
            market.delete_service(worker, OfferedServiceId::new(*service))?;
            0
        }
        Commands::SaveSchedule { service, file } => {
            let worker = actor(&cli)?;
            let raw = std::fs::read_to_string(file).with_context(|| format!("reading {file}"))?;
            market.save_schedule(worker, OfferedServiceId::new(*service), &raw)?;
            println!("Schedule saved for service {service}");
            0
        }
        Commands::CheckSchedule { file, exclude } => {
            let worker = actor(&cli)?;
            let raw = std::fs::read_to_string(file).with_context(|| format!("reading {file}"))?;
            let outcome =
                market.validate_schedule(worker, &raw, exclude.map(OfferedServiceId::new))?;
            match outcome.detail {
                None => {
                    println!("OK: no conflicts");
                    0
                }
                Some(detail) => {
                    eprintln!("{detail}");
                    // Code 2 = horaire refusé
                    2
                }
            }
        }
        Commands::ShowSchedule { service } => {
            match market.schedule_of(OfferedServiceId::new(*service))? {
                Some(schedule) => println!("{}", schedule.to_json()?),
                None => println!("no schedule"),
            }
            0
        }
        Commands::CheckSlot {
            service,
            date,
            start,
            end,
        } => {
            let check = market.check_slot_free(OfferedServiceId::new(*service), date, start, end, now)?;
            match check.reason {
                None => {
                    println!("available");
                    0
                }
                Some(reason) => {
                    println!("unavailable: {reason}");
                    2
                }
            }
        }
        Commands::Occupied { service, date } => {
            for hour in market.occupied_start_times(OfferedServiceId::new(*service), date)? {
                println!("{hour}");
            }
            0
        }
        Commands::Book {
            service,
            date,
            start,
            end,
            note,
        } => {
            let client = actor(&cli)?;
            let slot = BookingSlot::parse(date, start, end)?;
            let booking = market.request_booking(
                client,
                BookingRequest {
                    offered_service_id: OfferedServiceId::new(*service),
                    slot,
                    observations: note.clone(),
                },
                now,
            )?;
            println!(
                "Booking {} requested for {} {}",
                booking.id, booking.selected_slot.date, booking.selected_slot.range
            );
            0
        }
        Commands::Confirm { booking } => {
            let b = market.confirm(actor(&cli)?, BookingId::new(*booking), now)?;
            println!("Booking {} confirmed", b.id);
            0
        }
        Commands::Reject { booking } => {
            let b = market.reject(actor(&cli)?, BookingId::new(*booking), now)?;
            println!("Booking {} rejected", b.id);
            0
        }
        Commands::Start { booking } => {
            let b = market.start(actor(&cli)?, BookingId::new(*booking), now)?;
            println!("Booking {} in progress", b.id);
            0
        }
        Commands::Complete { booking } => {
            let b = market.complete(actor(&cli)?, BookingId::new(*booking), now)?;
            println!("Booking {} completed", b.id);
            0
        }
        Commands::Cancel { booking } => {
            let b = market.cancel(actor(&cli)?, BookingId::new(*booking), now)?;
            println!("Booking {} cancelled", b.id);
            0
        }
        Commands::Rate {
            booking,
            score,
            comment,
        } => {
            let rating = market.rate(
                actor(&cli)?,
                BookingId::new(*booking),
                *score,
                comment.clone(),
                now,
            )?;
            println!("Rating {} recorded ({}/5)", rating.id, rating.score);
            0
        }
        Commands::RetireWorker => {
            let report = market.retire_worker(actor(&cli)?, now)?;
            println!(
                "Retired: {} service(s) orphaned, {} booking(s) cancelled",
                report.orphaned_services.len(),
                report.cancelled_bookings.len()
            );
            0
        }
        Commands::List { out_json, out_csv } => {
            let snapshot = market.snapshot()?;
            if let Some(path) = out_json {
                io::export_database_json(path, &snapshot)?;
            }
            if let Some(path) = out_csv {
                io::export_bookings_csv(path, &snapshot, market.catalog())?;
            }
            let me = actor(&cli)?;
            let mut mine = market.bookings_for_client(me)?;
            mine.extend(market.bookings_for_worker(me)?);
            if mine.is_empty() {
                println!("no bookings");
            }
            // impression compacte
            for b in &mine {
                let state = market.catalog().state_of(b.state_id)?;
                println!(
                    "{} | {} {} | service {} | {}",
                    b.id, b.selected_slot.date, b.selected_slot.range, b.offered_service_id, state
                );
            }
            0
        }
    };

    std::process::exit(code);
}
