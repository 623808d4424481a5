//! Daily evaluation budget
//!
//! Caps how many secondary checks run per UTC day. Once the cap is hit,
//! results are returned with validation skipped and flagged unvalidated
//! instead of blocking the response path. The counter resets on day
//! rollover.

use chrono::NaiveDate;
use std::sync::{Mutex, MutexGuard};

struct BudgetDay {
    day: NaiveDate,
    used: u32,
}

/// Per-day cap on secondary validation checks
pub struct EvaluationBudget {
    daily_limit: u32,
    state: Mutex<BudgetDay>,
}

impl EvaluationBudget {
    pub fn new(daily_limit: u32) -> Self {
        Self {
            daily_limit,
            state: Mutex::new(BudgetDay {
                day: chrono::Utc::now().date_naive(),
                used: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BudgetDay> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Consume one evaluation slot if any remain today
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_on(chrono::Utc::now().date_naive())
    }

    fn try_acquire_on(&self, today: NaiveDate) -> bool {
        let mut state = self.lock();
        if state.day != today {
            state.day = today;
            state.used = 0;
        }
        if state.used >= self.daily_limit {
            return false;
        }
        state.used += 1;
        true
    }

    pub fn used_today(&self) -> u32 {
        self.lock().used
    }

    pub fn remaining_today(&self) -> u32 {
        let state = self.lock();
        self.daily_limit.saturating_sub(state.used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_exhausts() {
        let budget = EvaluationBudget::new(2);
        assert!(budget.try_acquire());
        assert!(budget.try_acquire());
        assert!(!budget.try_acquire());
        assert_eq!(budget.used_today(), 2);
        assert_eq!(budget.remaining_today(), 0);
    }

    #[test]
    fn test_budget_resets_on_day_rollover() {
        let budget = EvaluationBudget::new(1);
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        assert!(budget.try_acquire_on(today));
        assert!(!budget.try_acquire_on(today));
        assert!(budget.try_acquire_on(tomorrow));
    }

    #[test]
    fn test_zero_budget_always_skips() {
        let budget = EvaluationBudget::new(0);
        assert!(!budget.try_acquire());
    }
}
