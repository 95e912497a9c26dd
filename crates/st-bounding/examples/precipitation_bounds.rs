// Run with `SPIRAL_BOUNDING_LOG=st_bounding=debug cargo run -p st-bounding --example precipitation_bounds`
// to see every layer being resolved.

use st_bounding::{
    BoundingConfig, BoundingResult, BuildContext, NameToIndex, NameToStatIndex, Statistics,
    Tensor,
};

const CONFIG: &str = r#"
# Total precipitation and specific humidity never go negative.
[[bounding]]
type = "relu"
variables = ["tp"]

[[bounding]]
type = "normalized-relu"
variables = ["q"]
min_val = [0.0]
normalizer = ["mean-std"]

# Convective precipitation is a share of the (already bounded) total.
[[bounding]]
type = "fraction"
variables = ["cp"]
min_val = 0.0
max_val = 1.0
total_var = "tp"

[[bounding]]
type = "hardtanh"
variables = ["tcc"]
min_val = 0.0
max_val = 1.0
"#;

fn main() -> BoundingResult<()> {
    if let Err(err) = spiral_config::tracing::init_tracing() {
        eprintln!("tracing disabled: {err}");
    }

    let name_to_index = NameToIndex::from_names(&["t2m", "tp", "cp", "q", "tcc"]);
    // Statistics come from the dataset in their own order.
    let name_to_index_stats: NameToStatIndex = [("q", 0), ("t2m", 1)].into_iter().collect();
    let statistics = Statistics::new(
        vec![0.006, 285.0],
        vec![0.004, 12.0],
        vec![0.0, 220.0],
        vec![0.03, 320.0],
    )?;

    let config = BoundingConfig::from_toml_str(CONFIG)?;
    let ctx = BuildContext::new(&name_to_index).with_statistics(&statistics, &name_to_index_stats);
    let stack = config.build(&ctx)?;
    for conflict in stack.conflicts() {
        println!(
            "stage {} depends on column {} bounded by stage {}",
            conflict.later, conflict.column, conflict.earlier
        );
    }

    let raw = Tensor::from_rows(&[
        [0.3, -0.2, 0.4, -2.1, 1.3],
        [-1.1, 1.5, 1.2, 0.7, -0.4],
        [0.8, 0.6, -0.3, -1.4, 0.5],
    ])?;
    let bounded = stack.forward(&raw)?;
    for (before, after) in raw.to_rows().iter().zip(bounded.to_rows()) {
        println!("{before:>6.2?} -> {after:>6.2?}");
    }
    Ok(())
}
