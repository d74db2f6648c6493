//! Core domain logic for the time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - The Client → Project → Task → `TimeEntry` hierarchy and its validators
//! - Store interfaces that any persistence backend implements
//! - The timer state machine (at most one running entry)
//! - The switch/confirm flow used when starting over a running timer

mod memory;
pub mod model;
pub mod store;
pub mod switch;
pub mod timer;
pub mod types;
pub mod validation;

pub use memory::MemoryStore;
pub use model::{
    Client, NewClient, NewProject, NewTask, NewTimeEntry, Project, Task, TimeEntry,
    TimeEntryUpdate,
};
pub use store::{
    ClientStore, ProjectStore, Store, StoreError, StoreErrorKind, TaskStore, TimeEntryStore,
};
pub use switch::{
    Confirm, SWITCH_PROMPT, SwitchMessage, SwitchOptions, SwitchResult, TimerStatus, get_status,
    handle_timer_switch,
};
pub use timer::{
    StartOptions, StartRequest, Started, TimerConflict, TimerOutcome, TimerState,
    calculate_duration, calculate_duration_at, elapsed_seconds, get_timer_state,
    get_timer_state_at, start_timer, stop_timer, stop_timer_with_description,
};
pub use types::{ClientId, ProjectId, TaskId, TimeEntryId, UserId, ValidationError};
