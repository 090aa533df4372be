use hrana_ws::{FetchMode, HranaClient, ParamType, Params, Value};

fn main() -> anyhow::Result<()> {
    let url = std::env::var("LIBSQL_URL")?;
    let token = std::env::var("LIBSQL_AUTH_TOKEN").ok();

    let mut db = HranaClient::connect(&url, token.as_deref())?;
    println!("connected, protocol {:?}", db.protocol_version());

    db.exec(
        "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        (),
    )?;

    db.begin_transaction()?;
    db.exec("INSERT INTO users (name) VALUES (?)", [Value::text("Kit")])?;
    db.commit()?;
    println!("last insert id: {:?}", db.last_insert_id());

    let rows = db.query(
        "SELECT id, name FROM users WHERE name = :name",
        Params::named([(":name", Value::text("Kit"))]),
    )?;
    for row in rows {
        println!("{row:?}");
    }

    db.set_fetch_mode(FetchMode::Num);
    let mut statement = db.prepare("SELECT id, name FROM users WHERE id = ?");
    statement.bind_value(1usize, "1", ParamType::Int)?;
    let mut rows = statement.execute(())?;
    let names = rows.fetch_all_with(|row| row.get_text("name").unwrap_or_default().to_owned());
    println!("names: {names:?}");

    db.disconnect()?;
    Ok(())
}
