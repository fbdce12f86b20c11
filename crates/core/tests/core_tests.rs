//! Integration tests for treepack-core.

use rand::rngs::StdRng;
use rand::SeedableRng;
use treepack_core::{metropolis_accept, AnnealConfig, CoolingSchedule, Placement, Temperature};

#[test]
fn test_temperature_walk_reaches_t_min() {
    for cooling in [
        CoolingSchedule::Linear,
        CoolingSchedule::Exponential,
        CoolingSchedule::Polynomial { degree: 3.0 },
    ] {
        let config = AnnealConfig::default()
            .with_temperatures(0.5, 0.001)
            .with_steps(25, 10)
            .with_cooling(cooling);
        let mut temp = Temperature::new(&config);
        assert_eq!(temp.current(), 0.5);
        assert_eq!(temp.scale(), 1.0);

        let mut prev = temp.current();
        for _ in 0..config.n_steps {
            let t = temp.cool();
            assert!(t <= prev);
            assert!((0.0..=1.0).contains(&temp.scale()));
            prev = t;
        }
        assert_eq!(temp.step(), config.n_steps);
        assert!((temp.current() - 0.001).abs() < 1e-12);

        // Extra cooling stays at the floor
        temp.cool();
        assert!((temp.current() - 0.001).abs() < 1e-12);
    }
}

#[test]
fn test_acceptance_rate_falls_with_temperature() {
    let mut rng = StdRng::seed_from_u64(9);
    let rate = |t: f64, rng: &mut StdRng| {
        (0..2000).filter(|_| metropolis_accept(0.01, t, rng)).count() as f64 / 2000.0
    };
    let hot = rate(0.1, &mut rng);
    let cold = rate(0.001, &mut rng);
    // exp(-0.1) ~ 0.905, exp(-10) ~ 4.5e-5
    assert!((hot - 0.905).abs() < 0.05, "hot rate {}", hot);
    assert!(cold < 0.01, "cold rate {}", cold);
}

#[test]
fn test_placement_angles_stay_canonical() {
    let mut p = Placement::new(3, 1.0, 2.0, -90.0);
    assert_eq!(p.angle_deg, 270.0);
    for _ in 0..100 {
        p.rotate(123.4);
        assert!((0.0..360.0).contains(&p.angle_deg));
    }
}

#[cfg(feature = "serde")]
mod serde_tests {
    use super::*;

    #[test]
    fn test_anneal_config_json_round_trip() {
        let config = AnnealConfig::default()
            .with_cooling(CoolingSchedule::Polynomial { degree: 2.0 })
            .with_seed(123);
        let json = serde_json::to_string(&config).unwrap();
        let back: AnnealConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_anneal_config_partial_json() {
        let config: AnnealConfig =
            serde_json::from_str(r#"{"n_steps": 3, "cooling": "linear"}"#).unwrap();
        assert_eq!(config.n_steps, 3);
        assert_eq!(config.cooling, CoolingSchedule::Linear);
        assert_eq!(config.t_max, AnnealConfig::default().t_max);
    }

    #[test]
    fn test_placement_json() {
        let p = Placement::new(1, 0.5, -0.5, 45.0);
        let json = serde_json::to_string(&p).unwrap();
        let back: Placement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
