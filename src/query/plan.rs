//! Execution plan description.

use super::clause::SelectQuery;
use serde::{Deserialize, Serialize};

const FILTER_FACTOR: f64 = 0.3;
const JOIN_FACTOR: f64 = 2.0;
const AGGREGATE_FACTOR: f64 = 1.5;
const SORT_FACTOR: f64 = 1.2;

/// Step list with a heuristic cost.
///
/// Steps always follow the fixed stage order, whatever order the clauses had
/// in the query text. The cost is a product of per-stage factors and says
/// nothing about actual selectivity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<String>,
    pub estimated_cost: f64,
    pub optimization_notes: Vec<String>,
}

impl ExecutionPlan {
    pub fn generate(query: &SelectQuery) -> Self {
        let mut plan = Self {
            steps: vec![format!("Table Scan: {}", query.table)],
            estimated_cost: 1.0,
            optimization_notes: Vec::new(),
        };

        if query.filter.is_some() {
            plan.push("Filter: Apply WHERE conditions", FILTER_FACTOR);
        }
        if !query.joins.is_empty() {
            plan.push("Join: Apply table joins", JOIN_FACTOR);
        }
        if !query.group_by.is_empty() {
            plan.push("Aggregate: Apply GROUP BY", AGGREGATE_FACTOR);
        }
        if !query.order_by.is_empty() {
            plan.push("Sort: Apply ORDER BY", SORT_FACTOR);
        }

        plan.optimization_notes
            .push("Consider adding indexes for better performance".to_string());
        plan
    }

    fn push(&mut self, step: &str, factor: f64) {
        self.steps.push(step.to_string());
        self.estimated_cost *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_only() {
        let plan = ExecutionPlan::generate(&SelectQuery::parse("SELECT * FROM users").unwrap());
        assert_eq!(plan.steps, vec!["Table Scan: users"]);
        assert_eq!(plan.estimated_cost, 1.0);
        assert_eq!(plan.optimization_notes.len(), 1);
    }

    #[test]
    fn test_fixed_order_and_cost() {
        let query = SelectQuery::parse(
            "SELECT * FROM users ORDER BY age GROUP BY city WHERE age > 1",
        )
        .unwrap();
        let plan = ExecutionPlan::generate(&query);

        assert_eq!(
            plan.steps,
            vec![
                "Table Scan: users",
                "Filter: Apply WHERE conditions",
                "Aggregate: Apply GROUP BY",
                "Sort: Apply ORDER BY",
            ]
        );
        assert!((plan.estimated_cost - 0.3 * 1.5 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_join_factor() {
        let query = SelectQuery::parse("SELECT * FROM a JOIN b").unwrap();
        let plan = ExecutionPlan::generate(&query);
        assert_eq!(plan.steps[1], "Join: Apply table joins");
        assert_eq!(plan.estimated_cost, 2.0);
    }
}
