use std::collections::{BTreeMap, HashMap};

use models::{BillingRecord, GroupKey, Period, RankingRow, TrendRow};

#[derive(Debug, Default)]
struct PeriodAccumulator {
    total_amount: f64,
    record_count: usize,
}

/// Monthly trend: summed amount and row count per period, oldest first.
pub fn trend<'a, I>(rows: I) -> Vec<TrendRow>
where
    I: IntoIterator<Item = &'a BillingRecord>,
{
    let mut by_period: BTreeMap<Period, PeriodAccumulator> = BTreeMap::new();
    for r in rows {
        let acc = by_period.entry(r.period).or_default();
        acc.total_amount += r.total_amount;
        acc.record_count += 1;
    }

    by_period
        .into_iter()
        .map(|(period, acc)| TrendRow {
            period: period.key(),
            total_amount: acc.total_amount,
            record_count: acc.record_count,
        })
        .collect()
}

/// The `n` groups with the highest summed amount. Groups with equal totals keep
/// the order in which they were first seen.
pub fn top_n<'a, I>(rows: I, n: usize, key: GroupKey) -> Vec<RankingRow>
where
    I: IntoIterator<Item = &'a BillingRecord>,
{
    let mut groups: Vec<RankingRow> = Vec::new();
    let mut positions: HashMap<&'a str, usize> = HashMap::new();

    for r in rows {
        let group = key.value_of(r);
        let pos = *positions.entry(group).or_insert_with(|| {
            groups.push(RankingRow {
                group: group.to_string(),
                total_amount: 0.0,
            });
            groups.len() - 1
        });
        groups[pos].total_amount += r.total_amount;
    }

    // sort_by is stable
    groups.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount));
    groups.truncate(n);
    groups
}
