use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::calendar::YearMonth;
use crate::datastore::DataStore;
use crate::datetime::{ensure_storable, truncate_to_millis};
use crate::event::{Event, EventDraft, EventPatch};
use crate::settings::{Settings, ViewMode};
use crate::task::Task;

/// In-memory task and event collections with write-through persistence.
///
/// Every mutation builds a new collection, swaps it in and saves it. Edits and
/// deletes aimed at an unknown id change nothing and report `false`.
#[derive(Debug)]
pub struct Store {
    backend: DataStore,
    tasks: Vec<Task>,
    events: Vec<Event>,
    settings: Settings,
}

impl Store {
    #[tracing::instrument(skip(backend))]
    pub fn open(backend: DataStore) -> anyhow::Result<Self> {
        let tasks = backend.load_tasks()?;
        let events = backend.load_events()?;
        let settings = backend.load_settings()?;

        info!(
            tasks = tasks.len(),
            events = events.len(),
            dark_mode = settings.dark_mode,
            view_mode = %settings.view_mode,
            "loaded store"
        );

        Ok(Self {
            backend,
            tasks,
            events,
            settings,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn task(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn event(&self, id: u64) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    /// Returns the new task's id, or `None` when the title is blank.
    #[tracing::instrument(skip(self, now))]
    pub fn add_task(
        &mut self,
        title: &str,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<u64>> {
        if title.trim().is_empty() {
            debug!("blank title; task not created");
            return Ok(None);
        }

        let due_date = due_date.map(ensure_storable).transpose()?;
        let now = truncate_to_millis(now);
        let id = next_id(now, self.tasks.iter().map(|task| task.id));
        let mut task = Task::new(id, title.to_string(), now);
        task.due_date = due_date.map(truncate_to_millis);

        let mut tasks = self.tasks.clone();
        tasks.push(task);
        self.replace_tasks(tasks)?;

        info!(id, "task added");
        Ok(Some(id))
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_task(&mut self, id: u64) -> anyhow::Result<bool> {
        self.map_task(id, |task| task.completed = !task.completed)
    }

    /// A blank title leaves the task untouched.
    #[tracing::instrument(skip(self))]
    pub fn rename_task(&mut self, id: u64, title: &str) -> anyhow::Result<bool> {
        if title.trim().is_empty() {
            debug!(id, "blank title; rename ignored");
            return Ok(false);
        }
        self.map_task(id, |task| task.title = title.to_string())
    }

    #[tracing::instrument(skip(self))]
    pub fn set_due_date(
        &mut self,
        id: u64,
        due_date: Option<DateTime<Utc>>,
    ) -> anyhow::Result<bool> {
        let due_date = due_date
            .map(ensure_storable)
            .transpose()?
            .map(truncate_to_millis);
        self.map_task(id, |task| task.due_date = due_date)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove_task(&mut self, id: u64) -> anyhow::Result<bool> {
        if self.task(id).is_none() {
            debug!(id, "remove of unknown task ignored");
            return Ok(false);
        }

        let tasks = self
            .tasks
            .iter()
            .filter(|task| task.id != id)
            .cloned()
            .collect();
        self.replace_tasks(tasks)?;
        info!(id, "task removed");
        Ok(true)
    }

    /// Returns the new event's id, or `None` when the patient name is blank.
    #[tracing::instrument(skip(self, draft, now), fields(action = %draft.action_type))]
    pub fn add_event(&mut self, draft: EventDraft, now: DateTime<Utc>) -> anyhow::Result<Option<u64>> {
        if draft.patient_name.trim().is_empty() {
            debug!("blank patient name; event not created");
            return Ok(None);
        }

        let date = truncate_to_millis(ensure_storable(draft.date)?);
        let id = next_id(truncate_to_millis(now), self.events.iter().map(|event| event.id));
        let event = Event {
            id,
            patient_name: draft.patient_name,
            date,
            notes: draft.notes,
            action_type: draft.action_type,
        };

        let mut events = self.events.clone();
        events.push(event);
        self.replace_events(events)?;

        info!(id, "event added");
        Ok(Some(id))
    }

    /// The edited event is moved to the end of the collection.
    #[tracing::instrument(skip(self, patch))]
    pub fn update_event(&mut self, id: u64, patch: EventPatch) -> anyhow::Result<bool> {
        let Some(current) = self.event(id) else {
            debug!(id, "edit of unknown event ignored");
            return Ok(false);
        };

        let mut edited = current.clone();
        patch.apply_to(&mut edited);
        edited.date = truncate_to_millis(ensure_storable(edited.date)?);

        let mut events: Vec<Event> = self
            .events
            .iter()
            .filter(|event| event.id != id)
            .cloned()
            .collect();
        events.push(edited);
        self.replace_events(events)?;

        info!(id, "event updated");
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove_event(&mut self, id: u64) -> anyhow::Result<bool> {
        if self.event(id).is_none() {
            debug!(id, "remove of unknown event ignored");
            return Ok(false);
        }

        let events = self
            .events
            .iter()
            .filter(|event| event.id != id)
            .cloned()
            .collect();
        self.replace_events(events)?;
        info!(id, "event removed");
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn set_dark_mode(&mut self, dark_mode: bool) -> anyhow::Result<()> {
        self.replace_settings(Settings {
            dark_mode,
            ..self.settings
        })
    }

    pub fn toggle_dark_mode(&mut self) -> anyhow::Result<bool> {
        let next = !self.settings.dark_mode;
        self.set_dark_mode(next)?;
        Ok(next)
    }

    #[tracing::instrument(skip(self))]
    pub fn set_view_mode(&mut self, view_mode: ViewMode) -> anyhow::Result<()> {
        self.replace_settings(Settings {
            view_mode,
            ..self.settings
        })
    }

    pub fn toggle_view_mode(&mut self) -> anyhow::Result<ViewMode> {
        let next = self.settings.view_mode.toggled();
        self.set_view_mode(next)?;
        Ok(next)
    }

    #[tracing::instrument(skip(self))]
    pub fn set_focus_month(&mut self, focus_month: Option<YearMonth>) -> anyhow::Result<()> {
        self.replace_settings(Settings {
            focus_month,
            ..self.settings
        })
    }

    fn map_task<F>(&mut self, id: u64, edit: F) -> anyhow::Result<bool>
    where
        F: FnOnce(&mut Task),
    {
        let Some(idx) = self.tasks.iter().position(|task| task.id == id) else {
            debug!(id, "edit of unknown task ignored");
            return Ok(false);
        };

        let mut tasks = self.tasks.clone();
        edit(&mut tasks[idx]);
        self.replace_tasks(tasks)?;
        debug!(id, "task updated");
        Ok(true)
    }

    fn replace_tasks(&mut self, tasks: Vec<Task>) -> anyhow::Result<()> {
        self.backend.save_tasks(&tasks)?;
        self.tasks = tasks;
        Ok(())
    }

    fn replace_events(&mut self, events: Vec<Event>) -> anyhow::Result<()> {
        self.backend.save_events(&events)?;
        self.events = events;
        Ok(())
    }

    fn replace_settings(&mut self, settings: Settings) -> anyhow::Result<()> {
        self.backend.save_settings(&settings)?;
        self.settings = settings;
        Ok(())
    }
}

/// Millisecond timestamp of `now`, bumped past every existing id so ids stay
/// unique and strictly increasing.
pub fn next_id<I>(now: DateTime<Utc>, existing: I) -> u64
where
    I: IntoIterator<Item = u64>,
{
    let stamp = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    match existing.into_iter().max() {
        Some(max) if max >= stamp => max + 1,
        _ => stamp,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use super::{Store, next_id};
    use crate::datastore::DataStore;
    use crate::event::{ActionType, EventDraft, EventPatch};

    fn open_store(dir: &std::path::Path) -> Store {
        Store::open(DataStore::open(dir).expect("open datastore")).expect("open store")
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0)
            .single()
            .expect("valid")
    }

    #[test]
    fn next_id_never_repeats_within_a_millisecond() {
        let stamp = u64::try_from(now().timestamp_millis()).expect("positive");
        assert_eq!(next_id(now(), []), stamp);
        assert_eq!(next_id(now(), [stamp]), stamp + 1);
        assert_eq!(next_id(now(), [stamp - 10]), stamp);
    }

    #[test]
    fn blank_title_is_ignored() {
        let temp = tempdir().expect("tempdir");
        let mut store = open_store(temp.path());

        assert_eq!(store.add_task("   ", None, now()).expect("add"), None);
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn toggle_twice_restores_state() {
        let temp = tempdir().expect("tempdir");
        let mut store = open_store(temp.path());
        let id = store
            .add_task("Review labs", None, now())
            .expect("add")
            .expect("id");

        assert!(store.toggle_task(id).expect("toggle"));
        assert!(store.task(id).expect("task").completed);
        assert!(store.toggle_task(id).expect("toggle"));
        assert!(!store.task(id).expect("task").completed);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let temp = tempdir().expect("tempdir");
        let mut store = open_store(temp.path());
        store.add_task("Keep me", None, now()).expect("add");

        assert!(!store.toggle_task(42).expect("toggle"));
        assert!(!store.rename_task(42, "x").expect("rename"));
        assert!(!store.remove_task(42).expect("remove"));
        assert!(!store.remove_event(42).expect("remove event"));
        assert!(!store
            .update_event(42, EventPatch::default())
            .expect("update event"));
        assert_eq!(store.tasks().len(), 1);
    }

    #[test]
    fn rename_rejects_blank_and_due_date_clears() {
        let temp = tempdir().expect("tempdir");
        let mut store = open_store(temp.path());
        let id = store
            .add_task("Old", Some(now() + Duration::days(2)), now())
            .expect("add")
            .expect("id");

        assert!(!store.rename_task(id, " ").expect("rename"));
        assert_eq!(store.task(id).expect("task").title, "Old");
        assert!(store.rename_task(id, "New").expect("rename"));
        assert_eq!(store.task(id).expect("task").title, "New");

        assert!(store.set_due_date(id, None).expect("clear due"));
        assert_eq!(store.task(id).expect("task").due_date, None);
    }

    #[test]
    fn mutations_write_through() {
        let temp = tempdir().expect("tempdir");
        let (task_id, event_id) = {
            let mut store = open_store(temp.path());
            let task_id = store
                .add_task("Order supplies", Some(now()), now())
                .expect("add")
                .expect("id");
            let event_id = store
                .add_event(
                    EventDraft {
                        patient_name: "Grace".to_string(),
                        date: now() + Duration::hours(3),
                        notes: "follow-up".to_string(),
                        action_type: ActionType::ScheduleCall,
                    },
                    now(),
                )
                .expect("add event")
                .expect("event id");
            store.toggle_dark_mode().expect("dark mode");
            (task_id, event_id)
        };

        let store = open_store(temp.path());
        assert_eq!(store.task(task_id).expect("task").due_date, Some(now()));
        let event = store.event(event_id).expect("event");
        assert_eq!(event.patient_name, "Grace");
        assert_eq!(event.date, now() + Duration::hours(3));
        assert!(store.settings().dark_mode);
    }

    fn year(y: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, 6, 1, 8, 30, 0)
            .single()
            .expect("valid")
    }

    #[test]
    fn dates_past_9999_are_refused_before_saving() {
        let temp = tempdir().expect("tempdir");
        let mut store = open_store(temp.path());
        let draft = |date| EventDraft {
            patient_name: "Hana".to_string(),
            date,
            notes: String::new(),
            action_type: ActionType::CreateReminder,
        };

        assert!(store.add_task("Far", Some(year(11615)), now()).is_err());
        assert!(store.add_event(draft(year(11615)), now()).is_err());
        assert!(store.tasks().is_empty());
        assert!(store.events().is_empty());

        let task_id = store
            .add_task("Edge", Some(year(9999)), now())
            .expect("add")
            .expect("id");
        let event_id = store
            .add_event(draft(year(9999)), now())
            .expect("add")
            .expect("id");
        assert!(store.set_due_date(task_id, Some(year(10000))).is_err());
        let patch = EventPatch {
            date: Some(year(10000)),
            ..EventPatch::default()
        };
        assert!(store.update_event(event_id, patch).is_err());

        let reopened = open_store(temp.path());
        assert_eq!(
            reopened.task(task_id).expect("task").due_date,
            Some(year(9999))
        );
        assert_eq!(reopened.event(event_id).expect("event").date, year(9999));
    }

    #[test]
    fn edited_event_moves_to_the_end() {
        let temp = tempdir().expect("tempdir");
        let mut store = open_store(temp.path());
        let draft = |name: &str| EventDraft {
            patient_name: name.to_string(),
            date: now(),
            notes: String::new(),
            action_type: ActionType::SendMessage,
        };
        let first = store
            .add_event(draft("First"), now())
            .expect("add")
            .expect("id");
        store.add_event(draft("Second"), now()).expect("add");
        assert_eq!(store.add_event(draft(""), now()).expect("add"), None);

        let patch = EventPatch {
            notes: Some("moved".to_string()),
            patient_name: Some("  ".to_string()),
            ..EventPatch::default()
        };
        assert!(store.update_event(first, patch).expect("update"));

        let last = store.events().last().expect("events");
        assert_eq!(last.id, first);
        assert_eq!(last.patient_name, "First");
        assert_eq!(last.notes, "moved");
        assert_eq!(store.events().len(), 2);
    }
}
