use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{NaiveDate, Utc};
use society_accounting::{
    AccountNature, JournalEntry, JournalLine, LedgerAccount, TrialBalance, balances_as_of,
};
use society_core::{Money, UserId};
use uuid::Uuid;

/// A chart with `n` accounts per nature.
fn chart(n: usize) -> Vec<LedgerAccount> {
    AccountNature::ALL
        .iter()
        .enumerate()
        .flat_map(|(g, &nature)| {
            (0..n).map(move |i| {
                let code = format!("{}{:03}", g + 1, i);
                LedgerAccount::new(&code, &code, nature).expect("valid account")
            })
        })
        .collect()
}

/// `count` two-line entries spread over the chart and the month of April.
fn entries(accounts: &[LedgerAccount], count: usize) -> Vec<JournalEntry> {
    (0..count)
        .map(|i| {
            let dr = &accounts[i % accounts.len()];
            let cr = &accounts[(i * 7 + 3) % accounts.len()];
            let amount = Money::from_minor(((i % 997) as i64 + 1) * 100);
            JournalEntry {
                entry_id: Uuid::now_v7(),
                entry_date: NaiveDate::from_ymd_opt(2026, 4, (i % 30) as u32 + 1).expect("valid date"),
                reference: None,
                narration: String::new(),
                lines: vec![
                    JournalLine::debit(dr.code.clone(), amount),
                    JournalLine::credit(cr.code.clone(), amount),
                ],
                posted_by: UserId::new(),
                posted_at: Utc::now(),
            }
        })
        .collect()
}

fn bench_trial_balance(c: &mut Criterion) {
    let mut group = c.benchmark_group("trial_balance");
    let accounts = chart(50);
    let as_of = NaiveDate::from_ymd_opt(2026, 4, 20).expect("valid date");

    for count in [1_000usize, 10_000, 100_000] {
        let posted = entries(&accounts, count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("as_of", count), &posted, |b, posted| {
            b.iter(|| {
                let balances = balances_as_of(black_box(&accounts), black_box(posted), as_of)
                    .expect("balances in range");
                black_box(TrialBalance::from_accounts(balances))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_trial_balance);
criterion_main!(benches);
