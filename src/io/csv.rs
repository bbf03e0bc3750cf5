/*!
# Saving walk output to CSV

Enable via the `csv` feature.
*/

use ndarray::{Array3, Axis};
use std::error::Error;
use std::fs::File;

use csv::Writer;

/**
Saves the output of a walk, shaped **sample × dimension × chain** (`(T, n, z)`), as a CSV file.

The file has a header row `sample, chain, dim_0, dim_1, …` followed by one row per
sample and chain, holding that chain's position at that sample.

# Example

```rust
use ndarray::Array3;
use polytope_walk::io::csv::save_csv;

// 3 samples of 2 chains in dimension 2.
let samples = Array3::<f64>::zeros((3, 2, 2));
let file = std::env::temp_dir().join("polytope_walk_doc.csv");
save_csv(&samples, file.to_str().unwrap())?;
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/
pub fn save_csv<T: std::fmt::Display>(
    samples: &Array3<T>,
    filename: &str,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);
    let n_dims = samples.shape()[1];

    let mut header = vec!["sample".to_string(), "chain".to_string()];
    header.extend((0..n_dims).map(|i| format!("dim_{i}")));
    wtr.write_record(&header)?;

    for (sample_idx, batch) in samples.axis_iter(Axis(0)).enumerate() {
        // Columns of a batch are the chains.
        for (chain_idx, position) in batch.axis_iter(Axis(1)).enumerate() {
            let mut row = vec![sample_idx.to_string(), chain_idx.to_string()];
            row.extend(position.iter().map(|v| v.to_string()));
            wtr.write_record(&row)?;
        }
    }

    wtr.flush()?;
    Ok(())
}
