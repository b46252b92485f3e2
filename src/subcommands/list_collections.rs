use color_eyre::{Result, eyre::WrapErr};

use mongomate::store::DocumentStore;

pub struct Options {
    pub database: String,
    pub json: bool,
}

pub async fn command(store: &dyn DocumentStore, options: Options) -> Result<()> {
    let names = store
        .list_collections(&options.database)
        .await
        .wrap_err_with(|| format!("listing collections in {}", options.database))?;
    if options.json {
        println!("{}", serde_json::to_string(&names)?);
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}
