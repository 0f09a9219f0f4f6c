#[cfg(feature = "zstd-support")]
#[test]
fn test_zstd_roundtrip() {
    use s_zipstream::{CompressionMethod, EntrySource, ZipStream};
    use std::io::{Cursor, Read};

    let entries = vec![
        EntrySource::stream("test1.txt", Cursor::new(b"Hello from Zstd compression!".to_vec())),
        EntrySource::stream("test2.bin", Cursor::new(vec![42u8; 10000])),
    ];
    let stream = ZipStream::new(entries, CompressionMethod::Zstd);

    let mut archive = Vec::new();
    stream.write_to(&mut archive).unwrap();

    let mut reader = zip::ZipArchive::new(Cursor::new(archive)).expect("Failed to open zip");
    assert_eq!(reader.len(), 2);

    {
        let file = reader.by_name("test2.bin").unwrap();
        assert_eq!(file.compression(), zip::CompressionMethod::Zstd);
        // Verify compression actually happened (compressed should be much smaller)
        assert!(file.compressed_size() < file.size() / 2);
    }

    let mut data1 = String::new();
    reader
        .by_name("test1.txt")
        .unwrap()
        .read_to_string(&mut data1)
        .unwrap();
    assert_eq!(data1, "Hello from Zstd compression!");

    let mut data2 = Vec::new();
    reader
        .by_name("test2.bin")
        .unwrap()
        .read_to_end(&mut data2)
        .unwrap();
    assert_eq!(data2.len(), 10000);
    assert!(data2.iter().all(|&b| b == 42));
}

#[cfg(feature = "zstd-support")]
#[test]
fn test_zstd_default_still_deflates_nested_archives() {
    use s_zipstream::{CompressionMethod, EntrySource, StreamOptions, ZipStream};
    use std::io::Cursor;

    let options = StreamOptions::new(CompressionMethod::Zstd).with_compression_level(19);
    let stream = ZipStream::with_options(
        vec![EntrySource::stream("inner.zip", Cursor::new(vec![0u8; 2048]))],
        options,
    );
    let mut archive = Vec::new();
    stream.write_to(&mut archive).unwrap();

    let mut reader = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    assert_eq!(
        reader.by_name("inner.zip").unwrap().compression(),
        zip::CompressionMethod::Deflated
    );
}
