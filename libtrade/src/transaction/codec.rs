use crate::error::ReadError;
use crate::multisig::{read_signature, LiftedSignature};
use crate::transaction::{Destination, OutPoint, TxIn, TxOut, Txid, UnsignedTx};
use musig2::BinaryEncoding;

const DEST_KEY: u8 = 0;
const DEST_ADDRESS: u8 = 1;
const MAX_ITEMS: usize = 1024;

/// A cursor over a byte slice that reports which field ran out of data.
pub struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data }
    }

    pub fn read_bytes(&mut self, field: &str, len: usize) -> Result<&'a [u8], ReadError> {
        if self.data.len() < len {
            return Err(ReadError::new(field, format!("expected {len} bytes, {} remain", self.data.len())));
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    pub fn read_array<const N: usize>(&mut self, field: &str) -> Result<[u8; N], ReadError> {
        let bytes = self.read_bytes(field, N)?;
        let mut result = [0u8; N];
        result.copy_from_slice(bytes);
        Ok(result)
    }

    pub fn read_u8(&mut self, field: &str) -> Result<u8, ReadError> {
        Ok(self.read_array::<1>(field)?[0])
    }

    pub fn read_u16(&mut self, field: &str) -> Result<u16, ReadError> {
        Ok(u16::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_u32(&mut self, field: &str) -> Result<u32, ReadError> {
        Ok(u32::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_u64(&mut self, field: &str) -> Result<u64, ReadError> {
        Ok(u64::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_count(&mut self, field: &str) -> Result<usize, ReadError> {
        let count = self.read_u16(field)? as usize;
        if count > MAX_ITEMS {
            return Err(ReadError::new(field, format!("{count} items exceeds the limit of {MAX_ITEMS}")));
        }
        Ok(count)
    }

    pub fn read_string(&mut self, field: &str) -> Result<String, ReadError> {
        let len = self.read_u16(field)? as usize;
        let bytes = self.read_bytes(field, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ReadError::new(field, format!("invalid UTF-8: {e}")))
    }

    /// Fails if any bytes are left over.
    pub fn finish(self, field: &str) -> Result<(), ReadError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(ReadError::new(field, format!("{} trailing bytes", self.data.len())))
        }
    }
}

pub(crate) fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u16).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

pub(crate) fn write_outpoint(buf: &mut Vec<u8>, outpoint: &OutPoint) {
    buf.extend_from_slice(outpoint.txid.as_bytes());
    buf.extend_from_slice(&outpoint.vout.to_le_bytes());
}

pub(crate) fn read_outpoint(reader: &mut Reader<'_>) -> Result<OutPoint, ReadError> {
    let txid = Txid(reader.read_array("prev_out.txid")?);
    let vout = reader.read_u32("prev_out.vout")?;
    Ok(OutPoint { txid, vout })
}

pub(crate) fn write_output(buf: &mut Vec<u8>, output: &TxOut) {
    buf.extend_from_slice(&output.value.to_le_bytes());
    match &output.destination {
        Destination::Key(key) => {
            buf.push(DEST_KEY);
            buf.extend_from_slice(key);
        }
        Destination::Address(addr) => {
            buf.push(DEST_ADDRESS);
            write_string(buf, addr);
        }
    }
}

pub(crate) fn read_output(reader: &mut Reader<'_>) -> Result<TxOut, ReadError> {
    let value = reader.read_u64("output.value")?;
    let destination = match reader.read_u8("output.destination")? {
        DEST_KEY => Destination::Key(reader.read_array("output.key")?),
        DEST_ADDRESS => Destination::Address(reader.read_string("output.address")?),
        other => return Err(ReadError::new("output.destination", format!("unknown destination type {other}"))),
    };
    Ok(TxOut { value, destination })
}

pub(crate) fn write_tx(buf: &mut Vec<u8>, tx: &UnsignedTx) {
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.extend_from_slice(&(tx.inputs.len() as u16).to_le_bytes());
    for input in &tx.inputs {
        write_outpoint(buf, &input.prev_out);
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }
    buf.extend_from_slice(&(tx.outputs.len() as u16).to_le_bytes());
    for output in &tx.outputs {
        write_output(buf, output);
    }
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
}

pub(crate) fn read_tx(reader: &mut Reader<'_>) -> Result<UnsignedTx, ReadError> {
    let version = reader.read_u32("version")?;
    let n_inputs = reader.read_count("inputs")?;
    let mut inputs = Vec::with_capacity(n_inputs);
    for _ in 0..n_inputs {
        let prev_out = read_outpoint(reader)?;
        let sequence = reader.read_u32("sequence")?;
        inputs.push(TxIn { prev_out, sequence });
    }
    let n_outputs = reader.read_count("outputs")?;
    let mut outputs = Vec::with_capacity(n_outputs);
    for _ in 0..n_outputs {
        outputs.push(read_output(reader)?);
    }
    let lock_time = reader.read_u32("lock_time")?;
    Ok(UnsignedTx { version, lock_time, inputs, outputs })
}

pub(crate) fn write_witnesses(buf: &mut Vec<u8>, witnesses: &[LiftedSignature]) {
    buf.extend_from_slice(&(witnesses.len() as u16).to_le_bytes());
    for sig in witnesses {
        buf.extend_from_slice(&sig.to_bytes());
    }
}

pub(crate) fn read_witnesses(reader: &mut Reader<'_>) -> Result<Vec<LiftedSignature>, ReadError> {
    let count = reader.read_count("witnesses")?;
    (0..count)
        .map(|_| {
            let bytes = reader.read_bytes("witness", 64)?;
            read_signature("witness", bytes)
        })
        .collect()
}
