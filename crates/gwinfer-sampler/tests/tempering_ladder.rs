use approx::assert_relative_eq;
use gwinfer_core::RngHandle;
use gwinfer_sampler::config::{LadderConfig, LadderPolicy};
use gwinfer_sampler::tempering::{attempt_exchange, build_betas, exchange_acceptance};

#[test]
fn geometric_ladder_is_coldest_first() {
    let ladder = LadderConfig {
        base_temperature: 1.0,
        policy: LadderPolicy::Geometric { ratio: 2.0 },
    };
    let betas = build_betas(3, &ladder).unwrap();
    assert_eq!(betas.len(), 3);
    assert_relative_eq!(betas[0], 1.0);
    assert_relative_eq!(betas[1], 0.5);
    assert_relative_eq!(betas[2], 0.25);
}

#[test]
fn manual_ladder_must_match_ntemps() {
    let ladder = LadderConfig {
        base_temperature: 1.0,
        policy: LadderPolicy::Manual {
            temperatures: vec![1.0, 3.0],
        },
    };
    assert_eq!(build_betas(3, &ladder).unwrap_err().info().code, "ladder-length");
    let betas = build_betas(2, &ladder).unwrap();
    assert_relative_eq!(betas[1], 1.0 / 3.0);

    let negative = LadderConfig {
        base_temperature: 1.0,
        policy: LadderPolicy::Manual {
            temperatures: vec![1.0, -2.0],
        },
    };
    assert!(build_betas(2, &negative).is_err());
}

#[test]
fn exchange_favouring_cold_chain_always_accepts() {
    // Hot walker has the higher likelihood: moving it to the cold rung is favourable.
    assert_eq!(exchange_acceptance(1.0, -10.0, 0.5, -2.0), 1.0);
    let ratio = exchange_acceptance(1.0, -2.0, 0.5, -10.0);
    assert_relative_eq!(ratio, (-4.0_f64).exp(), epsilon = 1e-12);
    assert_eq!(exchange_acceptance(1.0, f64::NAN, 0.5, -1.0), 0.0);

    let mut rng = RngHandle::from_seed(11);
    let (accepted, acceptance) = attempt_exchange(1.0, -10.0, 0.5, -2.0, &mut rng);
    assert!(accepted);
    assert_eq!(acceptance, 1.0);
}
