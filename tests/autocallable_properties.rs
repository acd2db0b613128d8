use std::sync::Arc;

use approx::assert_relative_eq;
use chrono::NaiveDate;

use autocall_mc::config::{ModelSelector, RunConfig};
use autocall_mc::core::{DiagKey, PricingError};
use autocall_mc::instruments::{
    AutocallableNote, CapitalBarrier, RedemptionEvent, RedemptionSchedule, UpfrontCoupon,
};
use autocall_mc::market::Market;
use autocall_mc::mc::AutocallableSimulation;
use autocall_mc::rates::{DayCountConvention, FlatForward, YieldTermStructure};
use autocall_mc::vol::BlackConstantVol;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn settlement() -> NaiveDate {
    d(2017, 3, 31)
}

fn market(vol: f64) -> Market {
    let flat = |r: f64| -> Arc<dyn YieldTermStructure> {
        Arc::new(FlatForward::new(
            settlement(),
            r,
            DayCountConvention::Act365Fixed,
        ))
    };
    Market::builder()
        .settlement_date(settlement())
        .spot(15.35)
        .risk_free_curve(flat(-0.002))
        .risky_curve(flat(0.008))
        .dividend_curve(flat(0.04))
        .volatility(Arc::new(
            BlackConstantVol::new(settlement(), vol, DayCountConvention::Act365Fixed).unwrap(),
        ))
        .build()
        .unwrap()
}

fn window(y: i32) -> Vec<NaiveDate> {
    [(2, 20), (2, 21), (2, 22), (2, 25), (2, 26)]
        .iter()
        .map(|&(m, day)| d(y, m, day))
        .collect()
}

fn mip_note() -> AutocallableNote {
    let events = vec![
        RedemptionEvent::new(1000.0, 0.0, window(2018), 15.08, d(2018, 3, 5)),
        RedemptionEvent::new(1000.0, 58.0, window(2019), 15.08, d(2019, 3, 4)),
        RedemptionEvent::new(1000.0, 116.0, window(2020), 15.08, d(2020, 3, 4)),
        RedemptionEvent::new(1000.0, 174.0, window(2021), 15.08, d(2021, 3, 3)),
    ];
    note_with(events, 9.0504)
}

fn note_with(events: Vec<RedemptionEvent>, barrier: f64) -> AutocallableNote {
    AutocallableNote::new(
        settlement(),
        RedemptionSchedule::new(events).unwrap(),
        15.08,
        CapitalBarrier {
            level: barrier,
            observation_date: d(2021, 3, 1),
        },
        UpfrontCoupon {
            amount: 58.0,
            payment_date: d(2018, 3, 5),
        },
    )
    .unwrap()
}

fn lognormal(n_samples: usize) -> RunConfig {
    RunConfig::new(48, n_samples, ModelSelector::Lognormal)
}

#[test]
fn identical_inputs_reproduce_bit_identical_results() {
    let sim = AutocallableSimulation::new(market(0.25), mip_note(), None).unwrap();
    let a = sim.compute(&lognormal(3_000)).unwrap();
    let b = sim.compute(&lognormal(3_000)).unwrap();

    assert_eq!(a.price, b.price);
    assert_eq!(a.error_estimate, b.error_estimate);

    let mut other_seed = lognormal(3_000);
    other_seed.seed = 99;
    assert_ne!(sim.compute(&other_seed).unwrap().price, a.price);
}

#[test]
fn standard_error_halves_with_four_times_the_samples() {
    let sim = AutocallableSimulation::new(market(0.25), mip_note(), None).unwrap();
    let small = sim.compute(&lognormal(4_000)).unwrap();
    let large = sim.compute(&lognormal(16_000)).unwrap();

    let ratio = small.error_estimate / large.error_estimate;
    assert!(ratio > 1.7 && ratio < 2.3, "stderr ratio {ratio}");
}

#[test]
fn always_triggering_single_event_has_zero_error() {
    let event = RedemptionEvent::new(1000.0, 58.0, window(2018), 0.0, d(2018, 3, 5));
    let note = AutocallableNote::new(
        settlement(),
        RedemptionSchedule::new(vec![event]).unwrap(),
        15.08,
        CapitalBarrier {
            level: 1.0,
            observation_date: d(2018, 3, 1),
        },
        UpfrontCoupon {
            amount: 58.0,
            payment_date: d(2018, 3, 5),
        },
    )
    .unwrap();
    let sim = AutocallableSimulation::new(market(1e-8), note, None).unwrap();
    let report = sim.compute(&lognormal(500)).unwrap();

    assert_eq!(report.price, report.upfront_coupon_pv + sim.valuation()[0].value);
    assert_eq!(report.error_estimate, 0.0);
}

#[test]
fn zero_level_first_event_always_redeems_early() {
    let mut events = mip_note().schedule.events().to_vec();
    events[0].exercise_level = 0.0;
    let sim = AutocallableSimulation::new(market(0.35), note_with(events, 9.0504), None).unwrap();
    let report = sim.compute(&lognormal(1_000)).unwrap();

    assert_relative_eq!(
        report.price,
        report.upfront_coupon_pv + sim.valuation()[0].value,
        epsilon = 1e-9
    );
    assert_eq!(report.error_estimate, 0.0);
}

#[test]
fn zero_samples_are_rejected() {
    let sim = AutocallableSimulation::new(market(0.25), mip_note(), None).unwrap();
    let diffusion = sim
        .build_diffusion(ModelSelector::Lognormal)
        .unwrap()
        .diffusion;

    assert!(matches!(
        sim.run(&diffusion, &lognormal(0)),
        Err(PricingError::InvalidInput(_))
    ));
    assert!(matches!(
        sim.compute(&lognormal(0)),
        Err(PricingError::Config(_))
    ));
}

#[test]
fn unit_discounting_values_face_plus_coupon() {
    let zero: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::new(
        settlement(),
        0.0,
        DayCountConvention::Act365Fixed,
    ));
    let market = Market::builder()
        .settlement_date(settlement())
        .spot(15.35)
        .risk_free_curve(zero.clone())
        .risky_curve(zero)
        .volatility(Arc::new(
            BlackConstantVol::new(settlement(), 0.25, DayCountConvention::Act365Fixed).unwrap(),
        ))
        .build()
        .unwrap();
    let sim = AutocallableSimulation::new(market, mip_note(), None).unwrap();

    for (event, valuation) in sim.note().schedule.events().iter().zip(sim.valuation()) {
        assert_relative_eq!(
            valuation.value,
            event.face_amount + event.coupon,
            epsilon = 1e-12
        );
    }
}

#[test]
fn invalid_volatility_aborts_diffusion_construction() {
    #[derive(Debug)]
    struct NegativeVol;
    impl autocall_mc::vol::BlackVolTermStructure for NegativeVol {
        fn reference_date(&self) -> NaiveDate {
            settlement()
        }
        fn day_count(&self) -> DayCountConvention {
            DayCountConvention::Act365Fixed
        }
        fn black_variance_t(&self, _t: f64, _strike: f64) -> f64 {
            -1.0
        }
    }

    let mut market = market(0.25);
    market.volatility = Arc::new(NegativeVol);
    let sim = AutocallableSimulation::new(market, mip_note(), None).unwrap();
    assert!(sim.build_diffusion(ModelSelector::Lognormal).is_err());
}

#[test]
fn diagnostics_report_run_shape() {
    let sim = AutocallableSimulation::new(market(0.25), mip_note(), Some(3.93)).unwrap();
    let report = sim.compute(&lognormal(256)).unwrap();

    assert_eq!(report.n_samples, 256);
    assert_eq!(report.n_time_steps, 48);
    assert_eq!(
        report.diagnostics.get_key(DiagKey::NumTimeSteps).copied(),
        Some(48.0)
    );
    assert_eq!(
        report.diagnostics.get_key(DiagKey::ObservationCount).copied(),
        Some(20.0)
    );
    assert_eq!(report.valuation.len(), 4);
    assert!(report.relative_error.is_none());
}
