use std::error::Error;
use std::path::Path;

use dendrotrack::pipeline::{columns, per_branch, per_tree};
use dendrotrack::{
    align_trees, apply_remap, load_project, save_project, AlignConfig, Branch, FullState, Point,
    ProjectOptions, Tree,
};

/// A primary dendrite with a side branch and a filopodium whose tip moves by
/// `growth` pixels. With `prefix`, every point ID is prefixed so the stack
/// looks freshly traced.
fn stack(growth: f64, prefix: &str) -> Tree {
    let p = |id: &str, loc: [f64; 3]| Point::new(format!("{prefix}{id}"), loc);
    let branches = vec![
        Branch::new("primary", Some(format!("{prefix}soma"))).with_points(vec![
            p("d1", [20.0, 0.0, 0.0]),
            p("d2", [40.0, 0.0, 0.0]),
            p("d3", [60.0, 0.0, 0.0]),
            p("d4", [80.0, 0.0, 0.0]),
        ]),
        Branch::new("side", Some(format!("{prefix}d2"))).with_points(vec![
            p("s1", [40.0, 20.0, 0.0]),
            p("s2", [40.0, 40.0, 0.0]),
        ]),
        Branch::new("filo", Some(format!("{prefix}d3")))
            .with_points(vec![p("f1", [60.0, -8.0 - growth, 0.0])]),
    ];
    let soma = p("soma", [0.0; 3]).with_annotation("soma");
    Tree::from_parts(Some(soma), branches, Default::default())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let out_dir = Path::new(args.get(1).map_or(".", String::as_str));

    let options = ProjectOptions {
        pixel_sizes: [0.25, 0.25, 1.0],
        ..Default::default()
    };
    let mut state = FullState::from_trees(vec![stack(0.0, ""), stack(6.0, "x")], options);

    let alignment = align_trees(
        &state.trees[0],
        &state.trees[1],
        state.pixel_sizes(),
        &AlignConfig::default(),
        || false,
    )?;
    println!(
        "Aligned stack 2 onto stack 1: {} pairs, {} renamed, cost {:.2}",
        alignment.n_matched,
        alignment.remap.len(),
        alignment.cost
    );
    apply_remap(&mut state.trees[1], &alignment.remap, &mut state.ids);

    let project_path = out_dir.join("synthetic.dyn.gz");
    save_project(&state, &project_path)?;
    let state = load_project(&project_path)?;

    let trees = per_tree(&state, &columns::tree_columns())?;
    let branches = per_branch(&state, &columns::branch_columns())?;
    trees.write_csv(&out_dir.join("per_tree.csv"))?;
    branches.write_csv(&out_dir.join("per_branch.csv"))?;
    println!(
        "Wrote {} ({} stacks, {} branches)",
        project_path.display(),
        trees.n_rows(),
        branches.n_rows()
    );
    Ok(())
}
