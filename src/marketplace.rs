use crate::booking::{
    availability, queries, transitions, BookingRequest, BookingRules, SlotCheck, StateCatalog,
};
use crate::error::{Error, Result};
use crate::model::{
    Booking, BookingId, Database, OfferedService, OfferedServiceId, Rating, ServiceTypeId, UserId,
};
use crate::notification::{dispatch, Notice, Notifier};
use crate::offering::{self, NewOfferedService, Retirement, ServicePatch};
use crate::rating;
use crate::schedule::{conflicts, parse_date, store, ValidationOutcome, WeeklySchedule};
use crate::storage::Storage;
use chrono::NaiveDateTime;
use std::sync::{Mutex, MutexGuard};

/// Marketplace : encapsule la base, son stockage et le canal de notification.
///
/// Chaque opération d'écriture passe par une transaction : copie de la base, mutation,
/// sauvegarde, puis remplacement. Le verrou est tenu pendant toute la séquence, ce qui
/// sérialise « vérifier la disponibilité puis insérer ». Les notifications partent après
/// la validation, verrou relâché.
pub struct Marketplace<S: Storage> {
    storage: S,
    db: Mutex<Database>,
    catalog: StateCatalog,
    rules: BookingRules,
    notifier: Box<dyn Notifier>,
}

impl<S: Storage> Marketplace<S> {
    /// Charge la base depuis le stockage.
    pub fn open(storage: S, notifier: Box<dyn Notifier>) -> Result<Self> {
        let db = storage.load()?;
        Self::with_database(storage, db, notifier)
    }

    /// Démarre sur une base fournie ; le catalogue d'états est résolu ici.
    pub fn with_database(storage: S, db: Database, notifier: Box<dyn Notifier>) -> Result<Self> {
        let catalog = StateCatalog::resolve(&db.booking_states)?;
        Ok(Self {
            storage,
            db: Mutex::new(db),
            catalog,
            rules: BookingRules::default(),
            notifier,
        })
    }

    pub fn with_rules(mut self, rules: BookingRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }
    pub fn catalog(&self) -> &StateCatalog {
        &self.catalog
    }
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| Error::Storage(anyhow::anyhow!("database lock poisoned")))
    }

    /// Lecture cohérente de la base.
    pub fn read<T>(&self, f: impl FnOnce(&Database) -> T) -> Result<T> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    /// Copie de la base courante.
    pub fn snapshot(&self) -> Result<Database> {
        self.read(Database::clone)
    }

    fn transact<T>(
        &self,
        f: impl FnOnce(&mut Database) -> Result<(T, Vec<Notice>)>,
    ) -> Result<T> {
        let (value, notices) = {
            let mut guard = self.lock()?;
            let mut draft = guard.clone();
            let (value, notices) = f(&mut draft)?;
            self.storage.save(&draft)?;
            *guard = draft;
            (value, notices)
        };
        tracing::info!(notices = notices.len(), "transaction committed");
        dispatch(self.notifier.as_ref(), notices);
        Ok(value)
    }

    fn quiet<T>(value: T) -> Result<(T, Vec<Notice>)> {
        Ok((value, Vec::new()))
    }

    // --- utilisateurs et catalogue ---

    pub fn add_user(&self, first_name: &str, last_name: &str, email: Option<String>) -> Result<UserId> {
        self.transact(|db| Self::quiet(db.add_user(first_name, last_name, email)))
    }

    pub fn add_service_type(&self, name: &str) -> Result<ServiceTypeId> {
        self.transact(|db| Self::quiet(db.add_service_type(name)))
    }

    pub fn create_service(
        &self,
        worker: UserId,
        new: NewOfferedService,
        now: NaiveDateTime,
    ) -> Result<OfferedService> {
        self.transact(|db| Self::quiet(offering::create(db, worker, new, now)?))
    }

    /// Crée plusieurs services d'un coup (tout ou rien).
    pub fn import_services(
        &self,
        worker: UserId,
        services: Vec<NewOfferedService>,
        now: NaiveDateTime,
    ) -> Result<Vec<OfferedService>> {
        self.transact(|db| {
            let created = services
                .into_iter()
                .map(|new| offering::create(db, worker, new, now))
                .collect::<Result<Vec<_>>>()?;
            Self::quiet(created)
        })
    }

    pub fn update_service(
        &self,
        worker: UserId,
        id: OfferedServiceId,
        patch: ServicePatch,
        now: NaiveDateTime,
    ) -> Result<OfferedService> {
        self.transact(|db| Self::quiet(offering::update(db, worker, id, patch, now)?))
    }

    pub fn attach_image(&self, worker: UserId, id: OfferedServiceId, reference: &str) -> Result<()> {
        self.transact(|db| Self::quiet(offering::attach_image(db, worker, id, reference)?))
    }

    pub fn delete_service(&self, worker: UserId, id: OfferedServiceId) -> Result<()> {
        self.transact(|db| Self::quiet(offering::delete(db, worker, id)?))
    }

    pub fn list_public(&self) -> Result<Vec<OfferedService>> {
        self.read(|db| offering::list_public(db).into_iter().cloned().collect())
    }

    pub fn services_of(&self, worker: UserId) -> Result<Vec<OfferedService>> {
        self.read(|db| db.services_of(worker).cloned().collect())
    }

    // --- horaires ---

    /// Validation sans écriture ; toute erreur est rapportée dans le résultat.
    pub fn validate_schedule(
        &self,
        worker: UserId,
        candidate_json: &str,
        exclude: Option<OfferedServiceId>,
    ) -> Result<ValidationOutcome> {
        self.read(|db| conflicts::validate(db, worker, candidate_json, exclude))
    }

    pub fn save_schedule(
        &self,
        worker: UserId,
        id: OfferedServiceId,
        schedule_json: &str,
    ) -> Result<WeeklySchedule> {
        self.transact(|db| Self::quiet(offering::save_schedule(db, worker, id, schedule_json)?))
    }

    pub fn schedule_of(&self, id: OfferedServiceId) -> Result<Option<WeeklySchedule>> {
        self.read(|db| store::get(db, id))?
    }

    pub fn delete_schedule(&self, worker: UserId, id: OfferedServiceId) -> Result<bool> {
        self.transact(|db| Self::quiet(offering::delete_schedule(db, worker, id)?))
    }

    // --- disponibilité ---

    pub fn check_slot_free(
        &self,
        id: OfferedServiceId,
        date: &str,
        start: &str,
        end: &str,
        now: NaiveDateTime,
    ) -> Result<SlotCheck> {
        self.read(|db| {
            availability::check_slot_raw(db, &self.catalog, &self.rules, id, date, start, end, now)
        })?
    }

    /// Heures de début occupées (`"HH:MM"`, triées, sans doublon).
    pub fn occupied_start_times(&self, id: OfferedServiceId, date: &str) -> Result<Vec<String>> {
        let date = parse_date(date)?;
        let times = self.read(|db| availability::occupied_start_times(db, &self.catalog, id, date))??;
        Ok(times.into_iter().map(String::from).collect())
    }

    // --- réservations ---

    pub fn request_booking(
        &self,
        client: UserId,
        request: BookingRequest,
        now: NaiveDateTime,
    ) -> Result<Booking> {
        self.transact(|db| transitions::create(db, &self.catalog, &self.rules, client, request, now))
    }

    pub fn confirm(&self, worker: UserId, id: BookingId, now: NaiveDateTime) -> Result<Booking> {
        self.transact(|db| transitions::confirm(db, &self.catalog, worker, id, now))
    }

    pub fn reject(&self, worker: UserId, id: BookingId, now: NaiveDateTime) -> Result<Booking> {
        self.transact(|db| transitions::reject(db, &self.catalog, worker, id, now))
    }

    pub fn start(&self, worker: UserId, id: BookingId, now: NaiveDateTime) -> Result<Booking> {
        self.transact(|db| transitions::start(db, &self.catalog, worker, id, now))
    }

    pub fn complete(&self, worker: UserId, id: BookingId, now: NaiveDateTime) -> Result<Booking> {
        self.transact(|db| transitions::complete(db, &self.catalog, worker, id, now))
    }

    pub fn cancel(&self, client: UserId, id: BookingId, now: NaiveDateTime) -> Result<Booking> {
        self.transact(|db| {
            transitions::cancel_by_client(db, &self.catalog, &self.rules, client, id, now)
        })
    }

    pub fn booking(&self, id: BookingId) -> Result<Booking> {
        self.read(|db| db.find_booking(id).cloned())?
            .ok_or(Error::UnknownBooking(id))
    }

    pub fn pending_for_worker(&self, worker: UserId) -> Result<Vec<Booking>> {
        self.read(|db| queries::pending_for_worker(db, &self.catalog, worker))
    }

    pub fn bookings_for_worker(&self, worker: UserId) -> Result<Vec<Booking>> {
        self.read(|db| queries::for_worker(db, worker))
    }

    pub fn bookings_for_client(&self, client: UserId) -> Result<Vec<Booking>> {
        self.read(|db| queries::for_client(db, client))
    }

    // --- notes ---

    pub fn rate(
        &self,
        client: UserId,
        booking: BookingId,
        score: u8,
        comment: Option<String>,
        now: NaiveDateTime,
    ) -> Result<Rating> {
        self.transact(|db| {
            Self::quiet(rating::rate(
                db,
                &self.catalog,
                &self.rules,
                client,
                booking,
                score,
                comment,
                now,
            )?)
        })
    }

    pub fn ratings_for_worker(&self, worker: UserId) -> Result<Vec<Rating>> {
        self.read(|db| rating::ratings_for_worker(db, worker).into_iter().cloned().collect())
    }

    pub fn average_rating(&self, worker: UserId) -> Result<Option<f64>> {
        self.read(|db| rating::average_rating(db, worker))
    }

    // --- retrait ---

    pub fn retire_worker(&self, worker: UserId, now: NaiveDateTime) -> Result<Retirement> {
        self.transact(|db| offering::retire_worker(db, &self.catalog, worker, now))
    }
}
