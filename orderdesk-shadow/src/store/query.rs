//! Query facade: paged listing of orders and store-wide counts.

use super::helpers::{fetch_shadow, row_to_shadow, SHADOW_COLUMNS};
use super::ShadowStore;
use crate::error::ShadowResult;
use crate::types::{OrderPage, StoreStats};
use chrono::Utc;
use orderdesk_model::{OrderView, ShadowRecord};

impl ShadowStore {
    /// One page of listable orders, newest id first.
    ///
    /// `page` is clamped to at least 1 and `page_size` to
    /// `1..=max_page_size`.
    pub fn list_orders(&self, page: i64, page_size: i64) -> ShadowResult<OrderPage> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, self.config.max_page_size);
        let offset = (page - 1).saturating_mul(page_size);

        let (total, records) = {
            let conn = self.lock_conn()?;
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM shadow_records WHERE is_display_target = TRUE",
                [],
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {SHADOW_COLUMNS} FROM shadow_records WHERE is_display_target = TRUE \
                 ORDER BY id DESC LIMIT {page_size} OFFSET {offset}"
            ))?;
            let records = stmt
                .query_map([], row_to_shadow)?
                .collect::<Result<Vec<ShadowRecord>, _>>()?;
            (total, records)
        };

        let now = Utc::now();
        let orders = records
            .iter()
            .map(|record| OrderView::project(record, &self.projection, now))
            .collect();

        let total_pages = if total == 0 {
            0
        } else {
            (total + page_size - 1) / page_size
        };

        Ok(OrderPage {
            orders,
            total,
            page,
            page_size,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        })
    }

    /// The projected view of one shadow record, listable or not.
    pub fn get_order(&self, id: i64) -> ShadowResult<Option<OrderView>> {
        let record = {
            let conn = self.lock_conn()?;
            fetch_shadow(&conn, "id", id)?
        };
        Ok(record.map(|r| OrderView::project(&r, &self.projection, Utc::now())))
    }

    pub fn count_orders(&self) -> ShadowResult<i64> {
        let conn = self.lock_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM shadow_records WHERE is_display_target = TRUE",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn store_stats(&self) -> ShadowResult<StoreStats> {
        let conn = self.lock_conn()?;
        let stats = conn.query_row(
            r#"SELECT
                   COUNT(*),
                   COUNT(*) FILTER (WHERE is_edited),
                   COUNT(*) FILTER (WHERE is_display_target),
                   COUNT(*) FILTER (WHERE NOT is_display_target)
               FROM shadow_records"#,
            [],
            |row| {
                Ok(StoreStats {
                    total: row.get(0)?,
                    edited: row.get(1)?,
                    display_targets: row.get(2)?,
                    hidden: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }
}
