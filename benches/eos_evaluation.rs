//! Benchmarks for the evaluation of the residual Helmholtz energy
//! of SAFT-γ-Mie for a given `StateHD` and different types of dual numbers.
use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array;
use num_dual::DualNum;
use saftgm::saftgammamie::{test_utils, SaftGammaMie, SaftGammaMieParameters};
use saftgm_core::parameter::Parameter;
use saftgm_core::{Derivative, Residual, State, StateHD};
use std::sync::Arc;

/// State at 80% of the critical temperature and the critical volume.
fn state(parameters: &Arc<SaftGammaMieParameters>) -> State<SaftGammaMie> {
    let eos = Arc::new(SaftGammaMie::new(parameters.clone()));
    let cp = State::critical_point(&eos, None, Default::default()).unwrap();
    let moles = Array::from_elem(1, 10.0);
    State::new_nvt(&eos, 0.8 * cp.temperature, 10.0 / cp.density, &moles).unwrap()
}

fn a_res<D: DualNum<f64> + Copy>(inp: (&Arc<SaftGammaMie>, &StateHD<D>)) -> D {
    inp.0.evaluate_residual(inp.1)
}

fn d_hs<D: DualNum<f64> + Copy>(inp: (&SaftGammaMieParameters, D)) -> D {
    inp.0.hs_diameter(inp.1)[0]
}

fn bench_dual_numbers(
    c: &mut Criterion,
    group_name: &str,
    parameters: &Arc<SaftGammaMieParameters>,
) {
    let state = state(parameters);
    let parameters: &SaftGammaMieParameters = parameters;
    let mut group = c.benchmark_group(group_name);
    group.bench_function("d_f64", |b| {
        b.iter(|| d_hs((parameters, state.derive0().temperature)))
    });
    group.bench_function("d_dual", |b| {
        b.iter(|| d_hs((parameters, state.derive1(Derivative::DT).temperature)))
    });
    group.bench_function("d_dual2", |b| {
        b.iter(|| d_hs((parameters, state.derive2(Derivative::DT).temperature)))
    });

    group.bench_function("a_f64", |b| {
        b.iter(|| a_res((&state.eos, &state.derive0())))
    });
    group.bench_function("a_dual", |b| {
        b.iter(|| a_res((&state.eos, &state.derive1(Derivative::DV))))
    });
    group.bench_function("a_dual2", |b| {
        b.iter(|| a_res((&state.eos, &state.derive2(Derivative::DV))))
    });
    group.bench_function("a_hyperdual", |b| {
        b.iter(|| {
            a_res((
                &state.eos,
                &state.derive2_mixed(Derivative::DV, Derivative::DT),
            ))
        })
    });
}

fn butane(c: &mut Criterion) {
    let parameters = Arc::new(SaftGammaMieParameters::new_pure(test_utils::butane()).unwrap());
    bench_dual_numbers(c, "eos_evaluation_butane", &parameters);
}

fn methanol(c: &mut Criterion) {
    let parameters = Arc::new(SaftGammaMieParameters::new_pure(test_utils::methanol()).unwrap());
    bench_dual_numbers(c, "eos_evaluation_methanol", &parameters);
}

criterion_group!(bench, butane, methanol);
criterion_main!(bench);
