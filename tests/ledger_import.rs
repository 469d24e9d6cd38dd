use chrono::NaiveDate;
use crm_priority::workflows::ledger::{load_contact_log, LedgerImportError, LedgerImporter};
use crm_priority::workflows::outreach::{
    BusinessConfig, CooldownSource, OutreachPipeline, RunOptions,
};
use std::fs;

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 12).expect("valid run date")
}

fn config() -> BusinessConfig {
    BusinessConfig::from_json_str(
        r#"{ "defaults": { "gross_margin": 0.4, "category_cycle_days": 60,
             "expected_return_rate": 0.1, "touch_cost": 5 } }"#,
    )
    .expect("valid config")
}

const LEDGER: &str = "\u{feff}姓名,手机号,地址,顾客付款日期,收款额,打款金额,毛利,退款金额,退款类型,状态,出售平台,货品名,单号\n\
张三,138 0000 0001,杭州市,2025/09/01,¥150,100,773012345678,,,已发货,抖音,羊毛围巾,773012345678901\n\
张三,13800000001,杭州市,2025年10月3日,150,100,,,,已发货,抖音,羊毛围巾,773012345678902\n\
李四,13900000002,上海市,10/20,\"1,280.00\",,,,,已取消,淘宝,大衣,\n\
王五,,北京市,2025-08-15,300,200,,300,退货退款,已签收,淘宝,样品 大衣,\n";

#[test]
fn imports_aliased_headers_and_computes_profit_from_payments() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("orders.csv");
    fs::write(&path, LEDGER).expect("write ledger");

    let ledger = LedgerImporter::new(run_date())
        .import_path(&path)
        .expect("ledger imports");
    assert_eq!(ledger.total_rows, 4);
    assert!(ledger.rejected.is_empty());

    let first = &ledger.orders[0];
    assert_eq!(first.gross_revenue, 150.0);
    assert_eq!(first.payment_amount, Some(100.0));
    assert_eq!(first.tracking_number.as_deref(), Some("773012345678901"));
    assert_eq!(ledger.orders[1].order_date, NaiveDate::from_ymd_opt(2025, 10, 3).expect("valid"));
    assert_eq!(ledger.orders[2].order_date, NaiveDate::from_ymd_opt(2025, 10, 20).expect("valid"));
    assert_eq!(ledger.orders[2].gross_revenue, 1280.0);
    assert_eq!(ledger.orders[3].refund_amount, 300.0);

    let config = config();
    let options = RunOptions::from_config(&config, run_date());
    let outcome = OutreachPipeline::new(&config).run(
        &ledger.orders,
        &CooldownSource::unavailable("not needed"),
        &options,
    );

    // The sample order never reaches aggregation.
    assert_eq!(outcome.excluded_item_orders, 1);
    assert_eq!(outcome.overview().len(), 2);

    let zhang = &outcome.overview()[0];
    assert_eq!(zhang.key().0, "13800000001");
    assert_eq!(zhang.profile.valid_orders, 2);
    assert_eq!(zhang.profile.gross_profit, Some(100.0));
    assert!((zhang.metrics.estimated_margin - 50.0).abs() < 1e-9);

    let li = &outcome.overview()[1];
    assert_eq!(li.profile.valid_orders, 0);
    assert_eq!(li.profile.cancelled_orders, 1);
}

#[test]
fn mostly_unreadable_ledger_is_refused() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("broken.csv");
    fs::write(
        &path,
        "phone,order_date,gross_revenue\n13800000001,someday,10\n13800000002,,20\n13800000003,2025-10-01,30\n",
    )
    .expect("write ledger");

    let err = LedgerImporter::new(run_date())
        .import_path(&path)
        .expect_err("two of three rows unreadable");
    match err {
        LedgerImportError::Integrity(integrity) => {
            assert!(integrity.origin.ends_with("broken.csv"));
            assert_eq!(integrity.rejected, 2);
            assert!(integrity.to_string().contains("order_date"));
        }
        other => panic!("expected integrity error, got {other:?}"),
    }

    let lenient = LedgerImporter::new(run_date())
        .with_max_rejected_fraction(0.9)
        .import_path(&path)
        .expect("tolerated with a higher threshold");
    assert_eq!(lenient.orders.len(), 1);
}

#[test]
fn missing_ledger_file_is_an_io_error() {
    let err = LedgerImporter::new(run_date())
        .import_path("./no-such-ledger.csv")
        .expect_err("file missing");
    assert!(matches!(err, LedgerImportError::Io { .. }));
}

#[test]
fn contact_log_file_enables_cooldown() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("contacts.csv");
    fs::write(&path, "phone,last_contact\n13800000001,2025-11-10\n").expect("write log");

    match load_contact_log(Some(&path), run_date()) {
        CooldownSource::Available(log) => {
            assert_eq!(
                log.last_contact("13800000001"),
                NaiveDate::from_ymd_opt(2025, 11, 10)
            );
        }
        other => panic!("expected contact log, got {other:?}"),
    }

    let unreadable = dir.path().join("layout.csv");
    fs::write(&unreadable, "who,when\nA,B\n").expect("write log");
    assert!(!load_contact_log(Some(&unreadable), run_date()).is_available());
}
