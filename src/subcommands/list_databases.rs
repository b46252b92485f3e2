use color_eyre::Result;

use mongomate::store::DocumentStore;

pub struct Options {
    pub json: bool,
}

pub async fn command(store: &dyn DocumentStore, options: Options) -> Result<()> {
    let names = store.list_databases().await?;
    if options.json {
        println!("{}", serde_json::to_string(&names)?);
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}
