use sqlx::{QueryBuilder, Sqlite};

use crate::handlers::{Sort, TargetsFilter, ThrottleLogsFilter};

fn push_order_and_limit(query: &mut QueryBuilder<'static, Sqlite>, sort: &Sort, limit: Option<u32>, offset: Option<u32>) {
    query.push(" ORDER BY id");
    if let Sort::Desc = sort {
        query.push(" DESC");
    }

    if let Some(limit) = limit {
        query.push(" LIMIT ").push_bind(limit);
        if let Some(offset) = offset {
            query.push(" OFFSET ").push_bind(offset);
        }
    }
}

pub fn build_select_targets_query_with_filters(filter: &TargetsFilter) -> QueryBuilder<'static, Sqlite> {
    let mut query = QueryBuilder::new("SELECT * FROM targets");
    push_order_and_limit(&mut query, &filter.sort, filter.limit, filter.offset);
    query
}

pub fn build_select_throttle_logs_query_with_filters(filter: &ThrottleLogsFilter) -> QueryBuilder<'static, Sqlite> {
    let mut query = QueryBuilder::new("SELECT * FROM throttle_log");

    if let Some(from_timestamp) = filter.from_timestamp {
        query.push(" WHERE timestamp >= ").push_bind(from_timestamp);
    }

    push_order_and_limit(&mut query, &filter.sort, filter.limit, filter.offset);
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_query() {
        let filter = TargetsFilter {
            limit: Some(10),
            offset: Some(20),
            sort: Sort::Asc,
        };
        assert_eq!(
            build_select_targets_query_with_filters(&filter).sql(),
            "SELECT * FROM targets ORDER BY id LIMIT ? OFFSET ?"
        );
    }

    #[test]
    fn offset_requires_limit() {
        let filter = TargetsFilter {
            limit: None,
            offset: Some(20),
            sort: Sort::Desc,
        };
        assert_eq!(
            build_select_targets_query_with_filters(&filter).sql(),
            "SELECT * FROM targets ORDER BY id DESC"
        );
    }

    #[test]
    fn throttle_logs_query() {
        let filter = ThrottleLogsFilter {
            limit: Some(5),
            offset: None,
            from_timestamp: Some(1_700_000_000),
            sort: Sort::Desc,
        };
        assert_eq!(
            build_select_throttle_logs_query_with_filters(&filter).sql(),
            "SELECT * FROM throttle_log WHERE timestamp >= ? ORDER BY id DESC LIMIT ?"
        );
    }
}
