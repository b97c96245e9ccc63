use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use hpimportance::fanova::{FanovaConfig, Forest, Observations, decompose};
use hpimportance::hyperparameter::Hyperparameter;
use hpimportance::run::EncodedData;

fn observations(dims: usize, n: usize) -> Observations {
    let mut rng = fastrand::Rng::with_seed(42);
    let space: Vec<Hyperparameter> = (0..dims)
        .map(|i| Hyperparameter::float(format!("x{i}"), 0.0, 1.0).unwrap())
        .collect();
    let x: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..dims).map(|_| rng.f64()).collect())
        .collect();
    // Sum of squares with one pairwise interaction.
    let y = x
        .iter()
        .map(|r| r.iter().map(|v| v * v).sum::<f64>() + r[0] * r[1])
        .collect();
    Observations::new(&space, EncodedData { x, y }).unwrap()
}

fn bench_forest_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest_fit");
    group.sample_size(10);

    for n in [100, 500] {
        let obs = observations(5, n);
        group.bench_with_input(BenchmarkId::new("samples", n), &obs, |b, obs| {
            b.iter(|| Forest::fit(obs, &FanovaConfig::default()).unwrap());
        });
    }
    group.finish();
}

fn bench_decompose(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompose");
    group.sample_size(10);

    for dims in [3, 8] {
        let obs = observations(dims, 300);
        let forest = Forest::fit(&obs, &FanovaConfig::default()).unwrap();
        let names: Vec<String> = forest.names().to_vec();
        let mut subsets: Vec<Vec<&str>> = names.iter().map(|n| vec![n.as_str()]).collect();
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                subsets.push(vec![a.as_str(), b.as_str()]);
            }
        }
        let subsets: Vec<&[&str]> = subsets.iter().map(Vec::as_slice).collect();

        group.bench_with_input(BenchmarkId::new("dims", dims), &forest, |b, forest| {
            b.iter(|| decompose(forest, &subsets).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_forest_fit, bench_decompose);
criterion_main!(benches);
