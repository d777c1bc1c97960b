//! Order status projection for progress steppers and badges.
//!
//! Cosmetic only: the step index is never used to decide whether a status
//! change is allowed. The server accepts any transition, including backward
//! ones, and the projection renders whatever it is given.

use serde::Serialize;

use crate::models::OrderStatus;

/// Number of steps in the stepper (pending through delivered).
pub const STEP_COUNT: usize = OrderStatus::KNOWN.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Completed,
    Active,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressStep {
    pub index: usize,
    pub status: String,
    pub label: String,
    pub state: StepState,
}

/// Zero-based stepper position. Unknown statuses sit on step 0.
pub fn step_index(status: &OrderStatus) -> usize {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Preparing => 1,
        OrderStatus::Ready => 2,
        OrderStatus::OutForDelivery => 3,
        OrderStatus::Delivered => 4,
        OrderStatus::Other(_) => 0,
    }
}

pub fn status_label(status: &OrderStatus) -> String {
    match status {
        OrderStatus::Pending => "Pending".to_string(),
        OrderStatus::Preparing => "Preparing".to_string(),
        OrderStatus::Ready => "Ready".to_string(),
        OrderStatus::OutForDelivery => "Out for Delivery".to_string(),
        OrderStatus::Delivered => "Delivered".to_string(),
        OrderStatus::Other(raw) => raw.clone(),
    }
}

/// CSS-style class for a status badge (`status-badge out_for_delivery`).
pub fn badge_class(status: &OrderStatus) -> String {
    format!("status-badge {}", status.as_str())
}

pub fn progress_steps(status: &OrderStatus) -> Vec<ProgressStep> {
    let current = step_index(status);
    OrderStatus::KNOWN
        .iter()
        .enumerate()
        .map(|(index, step)| ProgressStep {
            index,
            status: step.as_str().to_string(),
            label: status_label(step),
            state: if index < current {
                StepState::Completed
            } else if index == current {
                StepState::Active
            } else {
                StepState::Upcoming
            },
        })
        .collect()
}
