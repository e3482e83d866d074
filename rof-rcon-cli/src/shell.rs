use rof_rcon_client::sync::RconClient;
use rof_rcon_client::Response;

/// Sends a raw command line and prints whatever fields come back.
pub fn run_raw(client: &mut RconClient, line: &str) -> rof_rcon_client::Result<()> {
    let response = client.execute(line)?;
    print_fields(&response);
    Ok(())
}

pub fn print_fields(response: &Response) {
    let mut fields: Vec<(&str, &str)> = response.fields().collect();
    if fields.is_empty() {
        println!("OK.");
        return;
    }
    fields.sort();
    for (key, value) in fields {
        println!("  {key} = {value}");
    }
}
