//! 转盘抽奖记录
//!
//! 同一手机号每天只能抽一次，由 (phone, play_day) 唯一索引保证。

use super::{map_unique, validate_day};
use crate::database::now_rfc3339;
use crate::errors::DaoError;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GamePlay {
    pub id: i64,
    pub player_name: String,
    pub phone: String,
    pub prize: String,
    pub play_day: String,
    pub created_at: String,
}

/// 只保留数字和开头的 `+`
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let mut normalized: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if trimmed.starts_with('+') {
        normalized.insert(0, '+');
    }
    normalized
}

pub struct GamePlayDao;

impl GamePlayDao {
    pub fn has_played(conn: &Connection, phone: &str, play_day: &str) -> Result<bool, DaoError> {
        Ok(conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM game_plays WHERE phone = ?1 AND play_day = ?2)",
            params![normalize_phone(phone), play_day],
            |row| row.get(0),
        )?)
    }

    pub fn record_play(
        conn: &Connection,
        player_name: &str,
        phone: &str,
        prize: &str,
        play_day: &str,
    ) -> Result<GamePlay, DaoError> {
        validate_day(play_day)?;
        let phone = normalize_phone(phone);
        if phone.trim_start_matches('+').len() < 6 {
            return Err(DaoError::invalid("手机号无效"));
        }

        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO game_plays (player_name, phone, prize, play_day, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![player_name.trim(), phone, prize, play_day, now],
        )
        .map_err(|e| map_unique(e, &format!("{phone} 今天已经抽过奖")))?;

        tracing::info!("[Game] {} 抽中 {}", phone, prize);
        Ok(GamePlay {
            id: conn.last_insert_rowid(),
            player_name: player_name.trim().to_string(),
            phone,
            prize: prize.to_string(),
            play_day: play_day.to_string(),
            created_at: now,
        })
    }

    /// 抽奖记录，最新的在前；指定日期时只返回当天
    pub fn list(conn: &Connection, play_day: Option<&str>) -> Result<Vec<GamePlay>, DaoError> {
        let mut stmt = conn.prepare(
            "SELECT id, player_name, phone, prize, play_day, created_at
             FROM game_plays
             WHERE ?1 IS NULL OR play_day = ?1
             ORDER BY id DESC",
        )?;
        let rows = stmt.query_map(params![play_day], |row| {
            Ok(GamePlay {
                id: row.get(0)?,
                player_name: row.get(1)?,
                phone: row.get(2)?,
                prize: row.get(3)?,
                play_day: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::dao::test_support::migrated_conn;

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_phone(" +51 987-654-321 "), "+51987654321");
        assert_eq!(normalize_phone("(01) 555 1234"), "015551234");
    }

    #[test]
    fn one_play_per_phone_per_day() {
        let conn = migrated_conn();
        GamePlayDao::record_play(&conn, "Rosa", "987 654 321", "discount_10", "2024-06-01").unwrap();
        assert!(GamePlayDao::has_played(&conn, "987654321", "2024-06-01").unwrap());

        let err = GamePlayDao::record_play(&conn, "Rosa", "987-654-321", "try_again", "2024-06-01")
            .unwrap_err();
        assert!(matches!(err, DaoError::Invalid(_)));

        // 第二天可以再玩
        GamePlayDao::record_play(&conn, "Rosa", "987654321", "try_again", "2024-06-02").unwrap();
        assert_eq!(GamePlayDao::list(&conn, None).unwrap().len(), 2);
        assert_eq!(GamePlayDao::list(&conn, Some("2024-06-02")).unwrap().len(), 1);
    }

    #[test]
    fn short_phone_is_invalid() {
        let conn = migrated_conn();
        let err = GamePlayDao::record_play(&conn, "", "12", "try_again", "2024-06-01").unwrap_err();
        assert!(matches!(err, DaoError::Invalid(_)));
    }
}
