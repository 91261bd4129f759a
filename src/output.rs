use crate::settlement::SettlementLine;

// Writes the settlement lines to the given stream, with the same columns the
// ledger receives.
pub fn write(
    output_stream: impl std::io::Write,
    lines: &[SettlementLine],
) -> Result<(), std::io::Error> {
    let mut writer = csv::Writer::from_writer(output_stream);

    for line in lines {
        writer.serialize(line)?;
    }

    writer.flush()
}
