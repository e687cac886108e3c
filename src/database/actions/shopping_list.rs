use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Pool, Postgres};

use crate::{error::Error, schema::Id};

/// One ingredient line of one recipe in the viewer's cart.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct CartLine {
    pub ingredient_name: String,
    pub measurement_unit: String,
    pub amount: i32,
    pub recipe_name: String,
}

/// Aggregated output row: one per distinct (ingredient name, unit) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListRow {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

pub async fn fetch_cart_lines(user_id: Id, pool: &Pool<Postgres>) -> Result<Vec<CartLine>, Error> {
    let lines: Vec<CartLine> = sqlx::query_as(
        "
        SELECT i.name AS ingredient_name, i.measurement_unit, l.amount, r.name AS recipe_name
        FROM shopping_cart sc
        INNER JOIN recipes r ON r.id = sc.recipe_id
        INNER JOIN ingredient_lines l ON l.recipe_id = r.id
        INNER JOIN ingredients i ON i.id = l.ingredient_id
        WHERE sc.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(lines)
}

/// Distinct recipe names contributing to the fetched lines, sorted by name.
/// Derived from the same row set as the totals so the two report sections
/// cannot disagree when the cart changes mid-build.
pub fn distinct_recipe_names(lines: &[CartLine]) -> Vec<String> {
    lines
        .iter()
        .map(|line| line.recipe_name.as_str())
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(String::from)
        .collect()
}

/// Sums amounts per distinct (ingredient name, measurement unit) pair. The
/// grouping key is the pair, never the name alone: the same name under two
/// units stays two rows. Output is sorted by ingredient name (ordinal),
/// independent of input order.
pub fn aggregate_cart_lines(lines: &[CartLine]) -> Vec<ShoppingListRow> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in lines {
        *totals
            .entry((line.ingredient_name.clone(), line.measurement_unit.clone()))
            .or_insert(0) += i64::from(line.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), total_amount)| ShoppingListRow {
            name,
            measurement_unit,
            total_amount,
        })
        .collect()
}

/// Renders the downloadable plain-text report. An empty cart is a valid
/// report, not an error.
pub fn render_shopping_list(
    date: NaiveDate,
    rows: &[ShoppingListRow],
    recipe_names: &[String],
) -> String {
    let ingredients_section = if rows.is_empty() {
        String::from("No ingredients")
    } else {
        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                format!(
                    "{}. {} — {} {}",
                    index + 1,
                    capitalize(&row.name),
                    row.total_amount,
                    row.measurement_unit
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    };

    let recipes_section = if recipe_names.is_empty() {
        String::from("No recipes")
    } else {
        recipe_names
            .iter()
            .enumerate()
            .map(|(index, name)| format!("{}. {}", index + 1, name))
            .collect::<Vec<String>>()
            .join("\n")
    };

    [
        format!("Shopping list generated: {}", date.format("%d-%m-%Y")),
        String::from("Ingredients:"),
        ingredients_section,
        String::new(),
        String::from("Recipes:"),
        recipes_section,
    ]
    .join("\n")
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Builds the full report for a user's cart from one fetched snapshot.
/// Read-only: the cart itself is never mutated.
pub async fn build_shopping_list(user_id: Id, pool: &Pool<Postgres>) -> Result<String, Error> {
    let lines = fetch_cart_lines(user_id, pool).await?;
    let rows = aggregate_cart_lines(&lines);
    let recipe_names = distinct_recipe_names(&lines);

    log::debug!(
        "shopping list for user {user_id}: {} rows from {} recipes",
        rows.len(),
        recipe_names.len()
    );

    Ok(render_shopping_list(
        Utc::now().date_naive(),
        &rows,
        &recipe_names,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ingredient: &str, unit: &str, amount: i32, recipe: &str) -> CartLine {
        CartLine {
            ingredient_name: ingredient.to_string(),
            measurement_unit: unit.to_string(),
            amount,
            recipe_name: recipe.to_string(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 23).unwrap()
    }

    #[test]
    fn sums_per_ingredient_and_unit_across_recipes() {
        let lines = vec![
            line("flour", "g", 200, "Recipe A"),
            line("flour", "g", 300, "Recipe B"),
            line("milk", "ml", 100, "Recipe B"),
        ];
        let rows = aggregate_cart_lines(&lines);
        assert_eq!(
            rows,
            vec![
                ShoppingListRow {
                    name: String::from("flour"),
                    measurement_unit: String::from("g"),
                    total_amount: 500,
                },
                ShoppingListRow {
                    name: String::from("milk"),
                    measurement_unit: String::from("ml"),
                    total_amount: 100,
                },
            ]
        );
    }

    #[test]
    fn aggregation_is_order_independent() {
        let mut lines = vec![
            line("sugar", "g", 50, "A"),
            line("flour", "g", 200, "A"),
            line("flour", "g", 300, "B"),
        ];
        let forward = aggregate_cart_lines(&lines);
        lines.reverse();
        assert_eq!(forward, aggregate_cart_lines(&lines));
    }

    #[test]
    fn same_name_under_different_units_stays_distinct() {
        let lines = vec![line("flour", "g", 200, "A"), line("flour", "kg", 1, "B")];
        let rows = aggregate_cart_lines(&lines);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].measurement_unit, "g");
        assert_eq!(rows[1].measurement_unit, "kg");
    }

    #[test]
    fn renders_the_two_recipe_scenario() {
        let lines = vec![
            line("flour", "g", 200, "Recipe A"),
            line("flour", "g", 300, "Recipe B"),
            line("milk", "ml", 100, "Recipe B"),
        ];
        let rows = aggregate_cart_lines(&lines);
        let recipes = distinct_recipe_names(&lines);
        let report = render_shopping_list(date(), &rows, &recipes);

        assert_eq!(
            report,
            "Shopping list generated: 23-08-2026\n\
             Ingredients:\n\
             1. Flour — 500 g\n\
             2. Milk — 100 ml\n\
             \n\
             Recipes:\n\
             1. Recipe A\n\
             2. Recipe B"
        );
    }

    #[test]
    fn recipe_section_comes_from_the_same_rows_as_the_totals() {
        let lines = vec![
            line("flour", "g", 200, "Borscht"),
            line("milk", "ml", 100, "Aioli"),
            line("sugar", "g", 10, "Borscht"),
        ];
        assert_eq!(
            distinct_recipe_names(&lines),
            vec![String::from("Aioli"), String::from("Borscht")]
        );
        assert!(distinct_recipe_names(&[]).is_empty());
    }

    #[test]
    fn empty_cart_renders_a_report_instead_of_failing() {
        let report = render_shopping_list(date(), &[], &[]);
        assert!(report.contains("No ingredients"));
        assert!(report.contains("No recipes"));
    }

    #[test]
    fn ingredient_names_are_capitalized_in_the_report() {
        let rows = aggregate_cart_lines(&[line("flour", "g", 10, "A")]);
        let report = render_shopping_list(date(), &rows, &[String::from("A")]);
        assert!(report.contains("1. Flour — 10 g"));
    }
}
