//! 原料与配方数据访问对象
//!
//! 配方挂在甜品下，由原料用量和附加成本组成；
//! 生产记录（recipe_sessions）按批次数登记，并返回所需原料汇总。

use super::{map_foreign_key, map_unique};
use crate::database::now_rfc3339;
use crate::errors::DaoError;
use crate::pricing::{production_requirements, recipe_unit_cost, CostLine, ProductionRun, UnitCost};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

// ============================================================================
// 原料
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub unit: String,
    pub unit_cost: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub unit: Option<String>,
    pub unit_cost: f64,
}

pub struct IngredientDao;

impl IngredientDao {
    pub fn list(conn: &Connection) -> Result<Vec<Ingredient>, DaoError> {
        let mut stmt = conn.prepare(
            "SELECT id, name, unit, unit_cost, created_at
             FROM ingredient_formulas ORDER BY name COLLATE NOCASE",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Ingredient {
                id: row.get(0)?,
                name: row.get(1)?,
                unit: row.get(2)?,
                unit_cost: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn create(conn: &Connection, ingredient: &NewIngredient) -> Result<Ingredient, DaoError> {
        let name = ingredient.name.trim();
        if name.is_empty() {
            return Err(DaoError::invalid("原料名称不能为空"));
        }
        if ingredient.unit_cost < 0.0 {
            return Err(DaoError::invalid("原料单价不能为负数"));
        }
        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO ingredient_formulas (name, unit, unit_cost, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, ingredient.unit.as_deref().unwrap_or("g"), ingredient.unit_cost, now],
        )
        .map_err(|e| map_unique(e, &format!("原料 {name} 已存在")))?;

        Ok(Ingredient {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            unit: ingredient.unit.clone().unwrap_or_else(|| "g".to_string()),
            unit_cost: ingredient.unit_cost,
            created_at: now,
        })
    }

    pub fn update_cost(conn: &Connection, id: i64, unit_cost: f64) -> Result<(), DaoError> {
        if unit_cost < 0.0 {
            return Err(DaoError::invalid("原料单价不能为负数"));
        }
        let changed = conn.execute(
            "UPDATE ingredient_formulas SET unit_cost = ?1 WHERE id = ?2",
            params![unit_cost, id],
        )?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("原料 {id}")));
        }
        Ok(())
    }
}

// ============================================================================
// 配方
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeItem {
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Extra {
    pub name: String,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub id: i64,
    pub dessert_id: i64,
    pub name: String,
    pub yield_units: f64,
    pub created_at: String,
    pub items: Vec<RecipeItem>,
    pub extras: Vec<Extra>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NewRecipeItem {
    pub ingredient_id: i64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipe {
    pub dessert_id: i64,
    pub name: String,
    pub yield_units: f64,
    pub items: Vec<NewRecipeItem>,
    #[serde(default)]
    pub extras: Vec<Extra>,
}

/// 一次生产登记中的单个配方
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ProductionEntry {
    pub recipe_id: i64,
    pub batches: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requirement {
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub unit: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub session_ids: Vec<i64>,
    pub requirements: Vec<Requirement>,
}

pub struct RecipeDao;

impl RecipeDao {
    pub fn list(conn: &Connection) -> Result<Vec<Recipe>, DaoError> {
        let ids: Vec<i64> = {
            let mut stmt = conn.prepare("SELECT id FROM dessert_recipes ORDER BY dessert_id, id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let mut recipes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(recipe) = Self::get(conn, id)? {
                recipes.push(recipe);
            }
        }
        Ok(recipes)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Recipe>, DaoError> {
        let header = conn
            .query_row(
                "SELECT id, dessert_id, name, yield_units, created_at FROM dessert_recipes WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Recipe {
                        id: row.get(0)?,
                        dessert_id: row.get(1)?,
                        name: row.get(2)?,
                        yield_units: row.get(3)?,
                        created_at: row.get(4)?,
                        items: Vec::new(),
                        extras: Vec::new(),
                    })
                },
            )
            .optional()?;
        let Some(mut recipe) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT i.ingredient_id, f.name, i.quantity, f.unit_cost
             FROM dessert_recipe_items i
             JOIN ingredient_formulas f ON f.id = i.ingredient_id
             WHERE i.recipe_id = ?1 ORDER BY i.id",
        )?;
        recipe.items = stmt
            .query_map(params![id], |row| {
                Ok(RecipeItem {
                    ingredient_id: row.get(0)?,
                    ingredient_name: row.get(1)?,
                    quantity: row.get(2)?,
                    unit_cost: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt =
            conn.prepare("SELECT name, cost FROM extras_items WHERE recipe_id = ?1 ORDER BY id")?;
        recipe.extras = stmt
            .query_map(params![id], |row| {
                Ok(Extra {
                    name: row.get(0)?,
                    cost: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(recipe))
    }

    pub fn create(conn: &Connection, recipe: &NewRecipe) -> Result<Recipe, DaoError> {
        if recipe.name.trim().is_empty() {
            return Err(DaoError::invalid("配方名称不能为空"));
        }
        if recipe.yield_units <= 0.0 {
            return Err(DaoError::invalid("产出数量必须大于 0"));
        }
        if recipe.items.iter().any(|i| i.quantity <= 0.0) {
            return Err(DaoError::invalid("原料用量必须大于 0"));
        }
        let dessert_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM desserts WHERE id = ?1)",
            params![recipe.dessert_id],
            |row| row.get(0),
        )?;
        if !dessert_exists {
            return Err(DaoError::not_found(format!("甜品 {}", recipe.dessert_id)));
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO dessert_recipes (dessert_id, name, yield_units, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![recipe.dessert_id, recipe.name.trim(), recipe.yield_units, now_rfc3339()],
        )?;
        let recipe_id = tx.last_insert_rowid();
        for item in &recipe.items {
            tx.execute(
                "INSERT INTO dessert_recipe_items (recipe_id, ingredient_id, quantity) VALUES (?1, ?2, ?3)",
                params![recipe_id, item.ingredient_id, item.quantity],
            )
            .map_err(|e| map_foreign_key(e, &format!("原料 {} 不存在", item.ingredient_id)))?;
        }
        for extra in &recipe.extras {
            tx.execute(
                "INSERT INTO extras_items (recipe_id, name, cost) VALUES (?1, ?2, ?3)",
                params![recipe_id, extra.name, extra.cost],
            )?;
        }
        tx.commit()?;

        tracing::info!("[Recipes] 新增配方 {} ({})", recipe_id, recipe.name.trim());
        Self::get(conn, recipe_id)?.ok_or_else(|| DaoError::not_found(format!("配方 {recipe_id}")))
    }

    pub fn unit_cost(conn: &Connection, id: i64) -> Result<UnitCost, DaoError> {
        let recipe = Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("配方 {id}")))?;
        let lines: Vec<CostLine> = recipe
            .items
            .iter()
            .map(|i| CostLine {
                quantity: i.quantity,
                unit_cost: i.unit_cost,
            })
            .collect();
        let extras: Vec<f64> = recipe.extras.iter().map(|e| e.cost).collect();
        Ok(recipe_unit_cost(&lines, &extras, recipe.yield_units)?)
    }

    /// 登记一次生产，返回按原料汇总的用量
    pub fn record_production(
        conn: &Connection,
        entries: &[ProductionEntry],
        user_ids: &[i64],
    ) -> Result<ProductionRecord, DaoError> {
        if entries.is_empty() {
            return Err(DaoError::invalid("生产登记至少需要一个配方"));
        }

        let mut recipes = Vec::with_capacity(entries.len());
        for entry in entries {
            let recipe = Self::get(conn, entry.recipe_id)?
                .ok_or_else(|| DaoError::not_found(format!("配方 {}", entry.recipe_id)))?;
            let items: Vec<(i64, f64)> = recipe
                .items
                .iter()
                .map(|i| (i.ingredient_id, i.quantity))
                .collect();
            recipes.push((entry.batches, items));
        }
        let runs: Vec<ProductionRun<'_>> = recipes
            .iter()
            .map(|(batches, items)| ProductionRun {
                batches: *batches,
                items,
            })
            .collect();
        let totals = production_requirements(&runs)?;

        let now = now_rfc3339();
        let tx = conn.unchecked_transaction()?;
        let mut session_ids = Vec::with_capacity(entries.len());
        for entry in entries {
            tx.execute(
                "INSERT INTO recipe_sessions (recipe_id, batches, produced_at, created_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![entry.recipe_id, entry.batches, now],
            )?;
            let session_id = tx.last_insert_rowid();
            for user_id in user_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO recipe_production_users (session_id, user_id) VALUES (?1, ?2)",
                    params![session_id, user_id],
                )
                .map_err(|e| map_foreign_key(e, &format!("用户 {user_id} 不存在")))?;
            }
            session_ids.push(session_id);
        }
        tx.commit()?;

        let mut requirements = Vec::with_capacity(totals.len());
        for (ingredient_id, quantity) in totals {
            let (name, unit): (String, String) = conn.query_row(
                "SELECT name, unit FROM ingredient_formulas WHERE id = ?1",
                params![ingredient_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            requirements.push(Requirement {
                ingredient_id,
                ingredient_name: name,
                unit,
                quantity,
            });
        }

        tracing::info!(
            "[Recipes] 登记生产 {} 个配方, 需要 {} 种原料",
            session_ids.len(),
            requirements.len()
        );
        Ok(ProductionRecord {
            session_ids,
            requirements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::dao::test_support::migrated_conn;

    fn ingredient(conn: &Connection, name: &str, unit_cost: f64) -> i64 {
        IngredientDao::create(
            conn,
            &NewIngredient {
                name: name.to_string(),
                unit: None,
                unit_cost,
            },
        )
        .unwrap()
        .id
    }

    fn flan(conn: &Connection) -> Recipe {
        let milk = ingredient(conn, "Leche", 0.002);
        let sugar = ingredient(conn, "Azúcar", 0.001);
        RecipeDao::create(
            conn,
            &NewRecipe {
                dessert_id: 1,
                name: "Base arcoíris".to_string(),
                yield_units: 10.0,
                items: vec![
                    NewRecipeItem {
                        ingredient_id: milk,
                        quantity: 1000.0,
                    },
                    NewRecipeItem {
                        ingredient_id: sugar,
                        quantity: 500.0,
                    },
                ],
                extras: vec![Extra {
                    name: "Vaso".to_string(),
                    cost: 0.25,
                }],
            },
        )
        .unwrap()
    }

    #[test]
    fn duplicate_ingredient_is_invalid() {
        let conn = migrated_conn();
        ingredient(&conn, "Leche", 0.002);
        let err = IngredientDao::create(
            &conn,
            &NewIngredient {
                name: "Leche".to_string(),
                unit: Some("ml".to_string()),
                unit_cost: 0.003,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DaoError::Invalid(_)));
    }

    #[test]
    fn recipe_round_trips_with_items_and_extras() {
        let conn = migrated_conn();
        let recipe = flan(&conn);
        assert_eq!(recipe.items.len(), 2);
        assert_eq!(recipe.extras.len(), 1);
        assert_eq!(RecipeDao::list(&conn).unwrap().len(), 1);
    }

    #[test]
    fn unit_cost_uses_current_ingredient_prices() {
        let conn = migrated_conn();
        let recipe = flan(&conn);

        // (1000 * 0.002 + 500 * 0.001) / 10 + 0.25
        let cost = RecipeDao::unit_cost(&conn, recipe.id).unwrap();
        assert_eq!(cost.batch_cost, 2.5);
        assert_eq!(cost.unit_cost, 0.5);

        IngredientDao::update_cost(&conn, recipe.items[0].ingredient_id, 0.004).unwrap();
        let cost = RecipeDao::unit_cost(&conn, recipe.id).unwrap();
        assert_eq!(cost.batch_cost, 4.5);
    }

    #[test]
    fn production_records_sessions_and_requirements() {
        let conn = migrated_conn();
        let recipe = flan(&conn);

        let record = RecipeDao::record_production(
            &conn,
            &[ProductionEntry {
                recipe_id: recipe.id,
                batches: 3.0,
            }],
            &[1, 2],
        )
        .unwrap();
        assert_eq!(record.session_ids.len(), 1);
        let milk = record
            .requirements
            .iter()
            .find(|r| r.ingredient_name == "Leche")
            .unwrap();
        assert_eq!(milk.quantity, 3000.0);

        let workers: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM recipe_production_users WHERE session_id = ?1",
                params![record.session_ids[0]],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(workers, 2);
    }

    #[test]
    fn production_rejects_non_positive_batches() {
        let conn = migrated_conn();
        let recipe = flan(&conn);
        let err = RecipeDao::record_production(
            &conn,
            &[ProductionEntry {
                recipe_id: recipe.id,
                batches: 0.0,
            }],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, DaoError::Invalid(_)));
    }
}
